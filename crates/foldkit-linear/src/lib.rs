pub mod components;
pub mod elastic_net;
pub mod logistic;
pub mod regression;

pub use components::*;
pub use elastic_net::*;
pub use logistic::*;
pub use regression::*;
