pub mod folds;
pub mod split;

pub use folds::*;
pub use split::*;
