pub mod recipe;
pub mod step;

pub use recipe::*;
pub use step::*;
