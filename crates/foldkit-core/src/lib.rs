pub mod error;
pub mod frame;
pub mod matrix;
pub mod roles;
pub mod task;

pub use error::{FoldkitError, Result};
pub use frame::{Column, ColumnData, ColumnKind, DataFrame, Value};
pub use matrix::Matrix;
pub use roles::{ColumnRole, PredictorSpec, Roles};
pub use task::{Predictions, Target};
