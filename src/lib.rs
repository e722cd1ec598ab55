//! Image-to-image serving gateway
//!
//! Accepts a source image and a prompt over HTTP and returns the image
//! produced by a shared diffusion pipeline, resized back to the source's
//! dimensions.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod imaging;

pub use error::{AppError, Result};

use std::sync::Arc;

use gateway::{ModelGateway, Orchestrator};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Build the state around an already loaded model gateway
    pub fn new(settings: config::Settings, gateway: Arc<ModelGateway>) -> Self {
        let orchestrator = Orchestrator::new(gateway, settings.model.working_size);
        Self {
            settings: Arc::new(settings),
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn gateway(&self) -> &Arc<ModelGateway> {
        self.orchestrator.gateway()
    }
}
