//! Common traits and types for image-to-image pipelines

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::Result;

/// Parameters for a single inference call.
///
/// Fixed for the life of the process; requests cannot override them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// How far the output may drift from the input image (0, 1]
    pub strength: f32,

    /// Classifier-free guidance; turbo checkpoints run without it
    pub guidance_scale: f32,

    /// Number of denoising steps
    pub num_inference_steps: u32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        GenerationConfig::default().into()
    }
}

impl From<GenerationConfig> for GenerationParameters {
    fn from(config: GenerationConfig) -> Self {
        Self {
            strength: config.strength,
            guidance_scale: config.guidance_scale,
            num_inference_steps: config.num_inference_steps,
        }
    }
}

/// One image-to-image inference
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub prompt: String,

    /// Source image at working resolution
    pub image: DynamicImage,

    pub parameters: GenerationParameters,
}

/// A loaded, device-resident image-to-image pipeline.
///
/// Implementations are not assumed to tolerate concurrent use; callers go
/// through [`ModelGateway`](crate::gateway::model_gateway::ModelGateway),
/// which hands out exclusive access.
#[async_trait]
pub trait Img2ImgPipeline: Send {
    /// Get the pipeline name
    fn name(&self) -> &str;

    /// Run one generation and return exactly one image
    async fn infer(&mut self, request: InferenceRequest) -> Result<DynamicImage>;
}
