pub mod anomaly;
pub mod config;
pub mod property;
pub mod transaction;

pub use anomaly::*;
pub use config::EngineConfig;
pub use property::*;
pub use transaction::*;
