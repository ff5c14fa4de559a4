use crate::cli::ServeArgs;
use crate::infra::{AppState, LoggingNotifier};
use crate::routes::with_lifecycle_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use eventcover::config::AppConfig;
use eventcover::error::AppError;
use eventcover::lifecycle::{InsuranceRepository, QuoteLifecycleService};
use eventcover::storage::{InMemoryRepository, SqliteRepository};
use eventcover::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(path) = args.database.take() {
        config.storage.database_path = Some(path);
    }

    telemetry::init(&config.telemetry)?;

    match config.storage.database_path.clone() {
        Some(path) => {
            let repository = SqliteRepository::open(&path)?;
            info!(path = %path.display(), "sqlite storage opened");
            serve_with(Arc::new(repository), config).await
        }
        None => {
            warn!("APP_DATABASE_PATH not set; quotes and policies are kept in memory");
            serve_with(Arc::new(InMemoryRepository::default()), config).await
        }
    }
}

async fn serve_with<R>(repository: Arc<R>, config: AppConfig) -> Result<(), AppError>
where
    R: InsuranceRepository + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(QuoteLifecycleService::new(
        repository,
        Arc::new(LoggingNotifier),
    ));

    let app = with_lifecycle_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "event insurance service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
