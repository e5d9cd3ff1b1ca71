pub mod aggregate;
pub mod family;
pub mod grid;
pub mod importance;
pub mod sweep;

pub use aggregate::*;
pub use family::*;
pub use grid::*;
pub use importance::*;
pub use sweep::*;
