//! Configuration module

mod settings;

pub use settings::{GenerationConfig, LoggingConfig, ModelConfig, ServerConfig, Settings};
