pub mod encoder;
pub mod filter;
pub mod impute;
pub mod other;
pub mod pca;
pub mod power;
pub mod scaler;
pub mod selector;

pub use encoder::*;
pub use filter::*;
pub use impute::*;
pub use other::*;
pub use pca::*;
pub use power::*;
pub use scaler::*;
pub use selector::*;
