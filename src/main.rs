//! Main entry point for the img2img serving gateway

use img2img_serving::{
    api,
    backend::{GenerationParameters, HttpPipeline},
    config::{LoggingConfig, Settings},
    gateway::ModelGateway,
    AppState,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    init_logging(&settings.logging);
    settings.validate()?;

    info!(
        "Loaded configuration: server={}:{} checkpoint={}",
        settings.server.host, settings.server.port, settings.model.checkpoint
    );

    // The pipeline must be resident before any traffic is accepted
    let pipeline = HttpPipeline::load(&settings.model).await?;
    let parameters = GenerationParameters::from(settings.generation);
    info!(
        strength = parameters.strength,
        guidance_scale = parameters.guidance_scale,
        num_inference_steps = parameters.num_inference_steps,
        working_size = settings.model.working_size,
        "Generation parameters"
    );
    let gateway = Arc::new(ModelGateway::new(Box::new(pipeline), parameters));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let app_state = Arc::new(AppState::new(settings, gateway));
    let app = api::create_router(app_state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
