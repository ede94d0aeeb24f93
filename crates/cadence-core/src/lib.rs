pub mod config;
pub mod error;
pub mod types;

pub use config::CadenceConfig;
pub use error::{CadenceError, Result};
pub use types::ScheduleId;
