use crate::cli::ServeArgs;
use crate::infra::{build_pipeline, AppState};
use crate::routes::with_billing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use kost_reminder::config::AppConfig;
use kost_reminder::error::AppError;
use kost_reminder::telemetry;
use kost_reminder::workflows::billing::{run_daily, DeliveryMetrics, MessagingChannel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

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
    DeliveryMetrics::describe();

    let billing = build_pipeline(&config)?;
    let channel = Arc::clone(billing.dispatcher.channel());

    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        channel: Arc::clone(channel.session()),
    };

    if let Err(err) = channel.connect().await {
        warn!(%err, "chat channel not connected yet; status watcher will keep polling");
    }
    let watcher = Arc::clone(&channel).spawn_status_watcher(config.channel.status_poll);
    let scheduler = tokio::spawn(run_daily(billing.schedule, Arc::clone(&billing.job)));

    let app = with_billing_routes(billing)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        fire_at = %config.reminder.fire_at,
        utc_offset = %config.reminder.utc_offset,
        offset_days = config.reminder.offset_days,
        "billing reminder notifier ready"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    readiness_flag.store(false, Ordering::Release);
    scheduler.abort();
    watcher.abort();
    if let Err(err) = channel.disconnect().await {
        warn!(%err, "failed to stop chat channel session");
    }

    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("ctrl_c signal received"),
        () = terminate => info!("terminate signal received"),
    }
}
