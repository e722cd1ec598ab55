//! Per-request control flow for `/generate`
//!
//! A request moves through validate, decode, resize-in, generate, resize-out
//! and encode in that order. Each stage is timed; the first failing stage ends
//! the request with a [`StageFailure`] naming it.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse, Result};
use crate::gateway::model_gateway::ModelGateway;
use crate::imaging::{codec, resize, ImageSize};

/// Inbound body of `/generate`. Fields are optional here so that a missing
/// field is reported by validation rather than by the JSON extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub control_image: Option<String>,
}

/// Successful body of `/generate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub generated_image: String,
}

struct ValidatedRequest {
    prompt: String,
    control_image: String,
}

impl GenerationRequest {
    fn validate(self) -> Result<ValidatedRequest> {
        let prompt = self
            .prompt
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AppError::InvalidRequest("Field 'prompt' is required".to_string()))?;
        let control_image = self
            .control_image
            .filter(|img| !img.trim().is_empty())
            .ok_or_else(|| {
                AppError::InvalidRequest("Field 'control_image' is required".to_string())
            })?;

        Ok(ValidatedRequest {
            prompt,
            control_image,
        })
    }
}

/// Processing stage of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Decode,
    ResizeIn,
    Generate,
    ResizeOut,
    Encode,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Decode => "decode",
            Stage::ResizeIn => "resize_in",
            Stage::Generate => "generate",
            Stage::ResizeOut => "resize_out",
            Stage::Encode => "encode",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request that stopped at `stage`
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: AppError,
    /// Time spent on the request up to and including the failing stage
    pub elapsed: Duration,
}

impl IntoResponse for StageFailure {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = Json(ErrorResponse {
            error: self.error.to_string(),
            stage: Some(self.stage.to_string()),
        });

        (status, body).into_response()
    }
}

/// Wall-clock durations of the completed stages of one request
#[derive(Debug)]
pub struct StageTimings {
    started: Instant,
    stages: Vec<(Stage, Duration)>,
}

impl StageTimings {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            stages: Vec::with_capacity(6),
        }
    }

    fn finish<T>(
        &mut self,
        stage: Stage,
        began: Instant,
        result: Result<T>,
    ) -> std::result::Result<T, StageFailure> {
        let took = began.elapsed();
        match result {
            Ok(value) => {
                info!(
                    stage = %stage,
                    elapsed_ms = took.as_secs_f64() * 1000.0,
                    "Stage completed"
                );
                self.stages.push((stage, took));
                Ok(value)
            }
            Err(error) => Err(StageFailure {
                stage,
                error,
                elapsed: self.started.elapsed(),
            }),
        }
    }

    fn record<T>(
        &mut self,
        stage: Stage,
        run: impl FnOnce() -> Result<T>,
    ) -> std::result::Result<T, StageFailure> {
        let began = Instant::now();
        let result = run();
        self.finish(stage, began, result)
    }

    async fn record_async<T>(
        &mut self,
        stage: Stage,
        run: impl Future<Output = Result<T>>,
    ) -> std::result::Result<T, StageFailure> {
        let began = Instant::now();
        let result = run.await;
        self.finish(stage, began, result)
    }

    /// Duration of a completed stage
    pub fn get(&self, stage: Stage) -> Option<Duration> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, took)| *took)
    }

    /// Time since the request was received
    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Run CPU-bound image work off the async worker threads
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("Image task failed: {}", e)))?
}

/// Runs requests through the stages against the shared model gateway
pub struct Orchestrator {
    gateway: Arc<ModelGateway>,
    working_size: u32,
}

impl Orchestrator {
    pub fn new(gateway: Arc<ModelGateway>, working_size: u32) -> Self {
        Self {
            gateway,
            working_size,
        }
    }

    pub fn gateway(&self) -> &Arc<ModelGateway> {
        &self.gateway
    }

    /// Handle one request end to end. Failures are logged here with their
    /// stage and elapsed time before being returned.
    pub async fn process(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, StageFailure> {
        let request_id = Uuid::new_v4();
        let span = info_span!("generate", %request_id);

        async move {
            info!("Received request for image generation");
            let mut timings = StageTimings::start();

            match self.run(request, &mut timings).await {
                Ok(response) => {
                    info!(
                        total_ms = timings.total().as_secs_f64() * 1000.0,
                        "Request completed"
                    );
                    Ok(response)
                }
                Err(failure) => {
                    Self::log_failure(&failure);
                    Err(failure)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Report a failure that happened before a request could be read, such as
    /// a malformed JSON body.
    pub fn reject(&self, error: AppError) -> StageFailure {
        let failure = StageFailure {
            stage: Stage::Validate,
            error,
            elapsed: Duration::ZERO,
        };
        Self::log_failure(&failure);
        failure
    }

    async fn run(
        &self,
        request: GenerationRequest,
        timings: &mut StageTimings,
    ) -> std::result::Result<GenerationResponse, StageFailure> {
        let ValidatedRequest {
            prompt,
            control_image,
        } = timings.record(Stage::Validate, || request.validate())?;

        let source = timings
            .record_async(
                Stage::Decode,
                blocking(move || codec::decode(&control_image)),
            )
            .await?;
        let original = ImageSize::of(&source);

        let working_size = self.working_size;
        let working = timings
            .record_async(
                Stage::ResizeIn,
                blocking(move || resize::to_working(&source, working_size)),
            )
            .await?;

        let generated = timings
            .record_async(Stage::Generate, self.gateway.infer(&prompt, working))
            .await?;

        let restored = timings
            .record_async(
                Stage::ResizeOut,
                blocking(move || resize::to_original(&generated, original)),
            )
            .await?;

        let generated_image = timings
            .record_async(Stage::Encode, blocking(move || codec::encode(&restored)))
            .await?;

        Ok(GenerationResponse { generated_image })
    }

    fn log_failure(failure: &StageFailure) {
        error!(
            stage = %failure.stage,
            error = %failure.error,
            elapsed_ms = failure.elapsed.as_secs_f64() * 1000.0,
            "Request failed"
        );
    }
}
