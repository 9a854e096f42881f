pub mod api;
pub mod config;
pub mod pipeline;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::pipeline::detection::{ClassifierError, GeminiClassifier};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("CROPDOC_API_KEY is not set")]
    MissingApiKey,
    #[error("Classifier setup failed: {0}")]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

/// Service entry point: logging, configuration, classifier, HTTP server.
pub async fn run() -> Result<(), StartupError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("CropDoc starting v{}", config::APP_VERSION);

    let config = config::ServiceConfig::from_env();
    let api_key = config.api_key.as_deref().ok_or(StartupError::MissingApiKey)?;

    let classifier = GeminiClassifier::new(&config.classifier_url, &config.classifier_model, api_key)?;
    tracing::info!(
        model = %config.classifier_model,
        detect_limit = config.detect_limit,
        analyze_limit = config.analyze_limit,
        "Classifier configured"
    );

    let ctx = api::ApiContext::from_config(&config, Arc::new(classifier));
    api::serve(config.bind_addr, ctx).await?;
    Ok(())
}
