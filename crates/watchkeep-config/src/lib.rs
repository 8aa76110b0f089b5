pub mod config;
pub mod paths;

pub use config::{CacheSettings, Config, LoggingConfig};
pub use paths::{container_base_path, PathManager};
