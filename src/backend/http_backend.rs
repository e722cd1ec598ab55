//! HTTP client for an external diffusion inference server

use async_trait::async_trait;
use image::DynamicImage;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::backend::traits::{Img2ImgPipeline, InferenceRequest};
use crate::config::ModelConfig;
use crate::error::{AppError, Result};
use crate::imaging::codec;

const LOAD_PATH: &str = "/v1/pipelines/load";
const IMG2IMG_PATH: &str = "/v1/images/img2img";

/// Image-to-image pipeline hosted by an inference server.
///
/// The server keeps the checkpoint resident on its accelerator; this client is
/// the process-wide handle to it.
pub struct HttpPipeline {
    name: String,
    client: Client,
    endpoint: String,
    checkpoint: String,
}

#[derive(Debug, Serialize)]
struct LoadPipelineRequest<'a> {
    checkpoint: &'a str,
    task: &'a str,
    device: &'a str,
    torch_dtype: &'a str,
    variant: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiImg2ImgRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    image: String,
    strength: f32,
    guidance_scale: f32,
    num_inference_steps: u32,
    n: u32,
}

/// Response from the inference server
#[derive(Debug, Deserialize)]
struct ApiImg2ImgResponse {
    #[serde(default)]
    images: Vec<ApiImageData>,
    #[serde(default)]
    data: Vec<ApiImageData>,
}

#[derive(Debug, Deserialize)]
struct ApiImageData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    base64: Option<String>,
}

impl HttpPipeline {
    /// Connect to the inference server and have it load the configured
    /// checkpoint. Any failure here means the service cannot start.
    pub async fn load(config: &ModelConfig) -> Result<Self> {
        let started = Instant::now();
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Startup(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let pipeline = Self {
            name: format!("http:{}", endpoint),
            client,
            endpoint,
            checkpoint: config.checkpoint.clone(),
        };
        let load_timeout = Duration::from_millis(config.load_timeout_ms);

        pipeline
            .check_health(&config.health_check_path, load_timeout)
            .await?;

        info!(
            checkpoint = %config.checkpoint,
            device = %config.device,
            torch_dtype = %config.torch_dtype,
            "Loading pipeline"
        );

        let response = pipeline
            .client
            .post(format!("{}{}", pipeline.endpoint, LOAD_PATH))
            .timeout(load_timeout)
            .json(&LoadPipelineRequest {
                checkpoint: &config.checkpoint,
                task: "image-to-image",
                device: &config.device,
                torch_dtype: &config.torch_dtype,
                variant: &config.variant,
            })
            .send()
            .await
            .map_err(|e| AppError::Startup(format!("Pipeline load request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Startup(format!(
                "Inference server refused to load {}: {} {}",
                config.checkpoint, status, body
            )));
        }

        info!(
            checkpoint = %config.checkpoint,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline loaded"
        );

        Ok(pipeline)
    }

    async fn check_health(&self, health_check_path: &str, timeout: Duration) -> Result<()> {
        let url = format!("{}{}", self.endpoint, health_check_path);
        match self.client.get(&url).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(endpoint = %self.endpoint, "Inference server is reachable");
                Ok(())
            }
            Ok(response) => Err(AppError::Startup(format!(
                "Inference server health check returned {}",
                response.status()
            ))),
            Err(e) => Err(AppError::Startup(format!(
                "Inference server unreachable at {}: {}",
                self.endpoint, e
            ))),
        }
    }
}

#[async_trait]
impl Img2ImgPipeline for HttpPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    async fn infer(&mut self, request: InferenceRequest) -> Result<DynamicImage> {
        let api_request = ApiImg2ImgRequest {
            model: &self.checkpoint,
            prompt: &request.prompt,
            image: codec::encode(&request.image)?,
            strength: request.parameters.strength,
            guidance_scale: request.parameters.guidance_scale,
            num_inference_steps: request.parameters.num_inference_steps,
            n: 1,
        };

        debug!(endpoint = %self.endpoint, "Sending img2img request");

        let response = self
            .client
            .post(format!("{}{}", self.endpoint, IMG2IMG_PATH))
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    warn!(endpoint = %self.endpoint, error = %e, "Inference server unavailable");
                    AppError::Resource(format!("Inference server unavailable: {}", e))
                } else {
                    AppError::HttpClient(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, body));
        }

        let api_response = response
            .json::<ApiImg2ImgResponse>()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to parse response: {}", e)))?;

        let encoded = api_response
            .images
            .into_iter()
            .chain(api_response.data)
            .find_map(|img| img.b64_json.or(img.base64))
            .ok_or_else(|| AppError::Generation("Pipeline returned no images".to_string()))?;

        codec::decode(&encoded).map_err(|e| {
            AppError::Generation(format!("Pipeline returned an unreadable image: {}", e))
        })
    }
}

/// Map a failed inference response to resource exhaustion or a generic
/// generation failure.
fn classify_failure(status: StatusCode, body: String) -> AppError {
    let exhausted = status == StatusCode::SERVICE_UNAVAILABLE
        || status == StatusCode::INSUFFICIENT_STORAGE
        || body.to_lowercase().contains("out of memory");

    if exhausted {
        AppError::Resource(format!("Inference server returned {}: {}", status, body))
    } else {
        AppError::Generation(format!("Inference server returned {}: {}", status, body))
    }
}
