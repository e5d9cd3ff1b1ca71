pub mod csv_io;
pub mod error;
pub mod json_io;
pub mod parquet_io;

pub use csv_io::*;
pub use error::{IoError, IoResult};
pub use json_io::*;
pub use parquet_io::*;
