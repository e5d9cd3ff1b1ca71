pub mod classification;
pub mod metric;
pub mod regression;

pub use classification::*;
pub use metric::{Direction, Metric};
pub use regression::*;
