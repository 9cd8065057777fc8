pub mod config;
pub mod naming;
pub mod routes;
pub mod types;

pub use config::BgdConfig;
pub use naming::{AppNames, AppRole};
pub use types::*;
