//! Composition root: configuration, logging, adapters and the HTTP server.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sla_consultant::adapters::{
    ai, app_router, ConsultationAppState, InMemoryMessageStore, InMemorySessionStore,
    InMemoryTemplateRepository, KeywordContextRetriever, YamlTemplateLoader,
};
use sla_consultant::application::consultation::{
    ConsultationOrchestrator, PromptBuilder, RetryPolicy,
};
use sla_consultant::config::{AppConfig, ServerConfig};

const DEFAULT_TEMPLATES_DIR: &str = "templates";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let model = ai::from_config(&config.ai)?;
    let info = model.provider_info();
    tracing::info!(provider = %info.name, model = %info.model, "Language model configured");

    let templates_dir = config
        .templates
        .directory
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR));
    let templates = YamlTemplateLoader::new(&templates_dir).load_all().await?;
    tracing::info!(
        count = templates.len(),
        dir = %templates_dir.display(),
        "Consultation templates loaded"
    );

    let mut orchestrator = ConsultationOrchestrator::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(InMemoryMessageStore::new()),
        Arc::new(InMemoryTemplateRepository::with_templates(templates)),
        Arc::clone(&model),
        config.consultation.clone(),
    )
    .with_retry(RetryPolicy::from_config(&config.ai));

    if let Some(dir) = config.retrieval.documents_dir.as_deref() {
        if config.retrieval.enabled {
            let retriever = KeywordContextRetriever::from_directory(dir)?;
            tracing::info!(
                documents = retriever.document_count(),
                dir = %dir.display(),
                "Reference documents indexed"
            );
            orchestrator = orchestrator.with_retriever(Arc::new(retriever), config.retrieval.clone());
        }
    }
    let orchestrator = orchestrator
        .with_prompt_builder(PromptBuilder::new(config.ai.temperature, config.ai.max_tokens));

    let state = ConsultationAppState::new(Arc::new(orchestrator), model);
    let app = app_router(state, &config.server);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "SLA consultant listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}
