pub mod decomposition;
pub mod eigen;
pub mod solve;

pub use decomposition::*;
pub use eigen::*;
pub use solve::*;
