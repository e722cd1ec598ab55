//! Exclusive access to the shared generation pipeline

use image::DynamicImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::backend::traits::{GenerationParameters, Img2ImgPipeline, InferenceRequest};
use crate::error::{AppError, Result};

/// Owner of the process-wide pipeline handle.
///
/// Built once before the server starts and shared by every request. Calls to
/// [`infer`](Self::infer) are serialized: the pipeline shares one accelerator
/// and its internal buffers, so at most one generation runs at a time no
/// matter how many requests are waiting.
///
/// Each inference runs on its own task. A caller that goes away mid-call
/// does not cut the generation short, and the lock is only released once
/// the pipeline has returned.
pub struct ModelGateway {
    pipeline: Arc<Mutex<Box<dyn Img2ImgPipeline>>>,
    pipeline_name: String,
    parameters: GenerationParameters,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    failed: AtomicU64,
    last_latency_ms: AtomicU64,
}

impl Counters {
    fn record(&self, succeeded: bool, elapsed: Duration) {
        self.last_latency_ms
            .store(elapsed.as_millis() as u64, Ordering::Relaxed);
        if succeeded {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Gateway statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayStats {
    pub completed: u64,
    pub failed: u64,
    pub last_latency_ms: u64,
}

impl ModelGateway {
    /// Wrap a loaded pipeline
    pub fn new(pipeline: Box<dyn Img2ImgPipeline>, parameters: GenerationParameters) -> Self {
        let pipeline_name = pipeline.name().to_string();
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            pipeline_name,
            parameters,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Generate one image from a prompt and a working-resolution source image
    pub async fn infer(&self, prompt: &str, image: DynamicImage) -> Result<DynamicImage> {
        if prompt.trim().is_empty() {
            return Err(AppError::InvalidRequest("Prompt cannot be empty".to_string()));
        }

        let request = InferenceRequest {
            prompt: prompt.to_string(),
            image,
            parameters: self.parameters,
        };

        let pipeline = self.pipeline.clone();
        let counters = self.counters.clone();
        let name = self.pipeline_name.clone();

        let task = tokio::spawn(async move {
            let mut pipeline = pipeline.lock_owned().await;
            let started = Instant::now();
            debug!(pipeline = %name, "Acquired pipeline");

            let result = pipeline.infer(request).await.and_then(|output| {
                if output.width() == 0 || output.height() == 0 {
                    Err(AppError::Generation(
                        "Pipeline returned an empty image".to_string(),
                    ))
                } else {
                    Ok(output)
                }
            });
            drop(pipeline);

            let elapsed = started.elapsed();
            counters.record(result.is_ok(), elapsed);
            if let Err(e) = &result {
                warn!(
                    pipeline = %name,
                    error = %e,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Inference failed"
                );
            }

            result
        });

        task.await
            .map_err(|e| AppError::Internal(format!("Inference task failed: {}", e)))?
    }

    /// Get the pipeline name
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// Get the fixed generation parameters
    pub fn parameters(&self) -> GenerationParameters {
        self.parameters
    }

    /// Get gateway statistics
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            last_latency_ms: self.counters.last_latency_ms.load(Ordering::Relaxed),
        }
    }
}
