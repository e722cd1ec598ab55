//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted request body; base64 images are large
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_body_bytes() -> usize {
    32 * 1024 * 1024
}

/// Inference server and checkpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default = "default_checkpoint")]
    pub checkpoint: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_torch_dtype")]
    pub torch_dtype: String,
    #[serde(default = "default_variant")]
    pub variant: String,
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
    /// Bound on the startup health check and checkpoint load; inference calls are
    /// never timed out here
    #[serde(default = "default_load_timeout")]
    pub load_timeout_ms: u64,
    /// Side of the square canvas the checkpoint expects
    #[serde(default = "default_working_size")]
    pub working_size: u32,
}

fn default_checkpoint() -> String {
    "stabilityai/sdxl-turbo".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:7860".to_string()
}

fn default_device() -> String {
    "cuda".to_string()
}

fn default_torch_dtype() -> String {
    "float16".to_string()
}

fn default_variant() -> String {
    "fp16".to_string()
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_load_timeout() -> u64 {
    300_000
}

fn default_working_size() -> u32 {
    512
}

/// Fixed generation parameters. Not client-tunable.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_strength")]
    pub strength: f32,
    #[serde(default)]
    pub guidance_scale: f32,
    #[serde(default = "default_steps")]
    pub num_inference_steps: u32,
}

fn default_strength() -> f32 {
    0.5
}

fn default_steps() -> u32 {
    2
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            strength: default_strength(),
            guidance_scale: 0.0,
            num_inference_steps: default_steps(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = Settings::default();
        let config = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("server.max_body_bytes", defaults.server.max_body_bytes as i64)?
            .set_default("model.checkpoint", defaults.model.checkpoint)?
            .set_default("model.endpoint", defaults.model.endpoint)?
            .set_default("generation.strength", defaults.generation.strength as f64)?
            .set_default(
                "generation.guidance_scale",
                defaults.generation.guidance_scale as f64,
            )?
            .set_default(
                "generation.num_inference_steps",
                defaults.generation.num_inference_steps as i64,
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .add_source(
                File::with_name(path.as_ref().to_str().unwrap_or("config/default"))
                    .required(false),
            )
            // Override with environment variables (prefixed with IMG2IMG_)
            .add_source(
                Environment::with_prefix("IMG2IMG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }
        if self.model.endpoint.trim().is_empty() {
            return Err(invalid("Model endpoint cannot be empty"));
        }
        if self.model.checkpoint.trim().is_empty() {
            return Err(invalid("Model checkpoint cannot be empty"));
        }
        if self.model.working_size == 0 {
            return Err(invalid("Working size must be positive"));
        }

        let generation = &self.generation;
        if !(generation.strength > 0.0 && generation.strength <= 1.0) {
            return Err(invalid(format!(
                "Strength must be in (0, 1], got {}",
                generation.strength
            )));
        }
        if generation.guidance_scale < 0.0 {
            return Err(invalid(format!(
                "Guidance scale cannot be negative, got {}",
                generation.guidance_scale
            )));
        }
        if generation.num_inference_steps == 0 {
            return Err(invalid("Number of inference steps must be positive"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Config(config::ConfigError::Message(message.into()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                max_body_bytes: default_max_body_bytes(),
            },
            model: ModelConfig {
                checkpoint: default_checkpoint(),
                endpoint: default_endpoint(),
                device: default_device(),
                torch_dtype: default_torch_dtype(),
                variant: default_variant(),
                health_check_path: default_health_check_path(),
                load_timeout_ms: default_load_timeout(),
                working_size: default_working_size(),
            },
            generation: GenerationConfig::default(),
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}
