use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemorySessionStore};
use crate::routes::with_funnel_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use quiz_funnel::config::{AppConfig, SourceConfig};
use quiz_funnel::error::AppError;
use quiz_funnel::funnel::{FunnelService, FunnelSource};
use quiz_funnel::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let source = Arc::new(FunnelSource::from_config(&config.source)?);
    let store = Arc::new(InMemorySessionStore::new(config.session_ttl));
    let service = Arc::new(FunnelService::new(store, source, config.flow.clone()));

    let app = with_funnel_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    let debug_source = matches!(config.source, SourceConfig::Fixture { .. });
    info!(?config.environment, %addr, debug_source, "quiz funnel ready");

    axum::serve(listener, app).await?;
    Ok(())
}
