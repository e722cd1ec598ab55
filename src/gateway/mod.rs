//! Gateway module - Shared model access and request orchestration

pub mod model_gateway;
pub mod orchestrator;

pub use model_gateway::{GatewayStats, ModelGateway};
pub use orchestrator::{GenerationRequest, GenerationResponse, Orchestrator, Stage, StageFailure};
