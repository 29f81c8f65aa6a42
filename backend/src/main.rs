use axum::{
    Router,
    http::Method,
    routing::get,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod automations;
mod channels;
mod config;
mod containers;
mod database;
mod deployments;
mod error;
mod handlers;
mod jobs;
mod orchestrator;
mod store;

pub use error::{ApiError, ApiResult, AppError};

#[cfg(test)]
mod tests;

pub struct AppState {
    pub orchestrator: Arc<orchestrator::Orchestrator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;
    let db_pool = database::create_pool(&config.database_url).await?;

    database::migrate(&db_pool).await?;

    let store: Arc<dyn store::Store> = Arc::new(store::PgStore::new(db_pool));
    let secrets: Arc<dyn channels::SecretStore> = Arc::new(channels::MemorySecretStore::new());

    let runtime = Arc::new(containers::HttpContainerRuntime::new(
        config.containers.runtime_url.clone(),
    ));
    let container_manager = Arc::new(containers::ContainerManager::new(
        store.clone(),
        runtime,
        config.containers.clone(),
    ));

    let pipeline = deployments::DeploymentPipeline::new(
        store.clone(),
        container_manager.clone(),
        Duration::from_secs(config.containers.deploy_timeout_secs),
    );

    let sms = Arc::new(channels::HttpSmsSender::new(
        config.channels.sms_gateway_url.clone(),
    ));
    let voice = Arc::new(channels::HttpVoiceSender::new(
        config.channels.voice_gateway_url.clone(),
    ));
    let executor = Arc::new(automations::ActionExecutor::new(
        store.clone(),
        secrets.clone(),
        sms,
        voice,
    ));
    let engine = automations::AutomationEngine::new(store.clone(), executor);

    let orchestrator = Arc::new(orchestrator::Orchestrator::new(
        store,
        secrets,
        container_manager,
        pipeline,
        engine,
    ));

    let job_scheduler =
        jobs::JobScheduler::new(orchestrator.clone(), jobs::JobConfig::default()).await?;
    job_scheduler.start().await?;

    let app_state = Arc::new(AppState { orchestrator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(|| async { "Tenantflow Orchestration API v1.0.0" }))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1/deployments", handlers::deployment_routes())
        .nest("/api/v1/containers", handlers::container_routes())
        .nest("/api/v1/automations", handlers::automation_routes())
        .nest("/api/v1/events", handlers::event_routes())
        .nest("/api/v1/leads", handlers::lead_routes())
        .nest("/api/v1/templates", handlers::template_routes())
        .nest("/api/v1/credentials", handlers::secret_routes())
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
