pub mod error_handling;
pub mod logging;
pub mod pipeline_config;

pub use error_handling::{NightModeError, Result};
