use anyhow::Result;
use fleetscaler::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let cloud = Arc::new(
        cloud_repo::OpenStackRepo::connect(&app_config.cloud)
            .await
            .map_err(|e| anyhow::anyhow!("cloud provider: {}", e))?,
    );
    let metrics = Arc::new(metrics_repo::HttpMetricsRepo::new(&app_config.metrics)?);
    let repo = Arc::new(observation_repo::ObservationRepo::new(
        &app_config.storage.games_path,
    ));
    let patterns = scaling::PatternStore::load(std::path::Path::new(
        &app_config.storage.pattern_path,
    ));
    let engine = scaling::ScalingEngine::new(
        app_config.fleet.players_per_vm,
        patterns,
        scaling::ChangeLog::open(&app_config.storage.change_log_path),
    );
    let fleet = fleet::FleetController::new(
        cloud,
        fleet::FleetSettings::from_config(&app_config.fleet, &app_config.cloud),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let controller = controller::Controller::new(
        controller::ControllerDeps {
            metrics,
            repo: repo.clone(),
            fleet,
            engine,
            policy: app_config.scaling.clone(),
        },
        controller::ControllerSettings::from_config(&app_config),
    );
    let controller_handle = controller::spawn(controller, shutdown_rx);
    tracing::info!(
        managed_title = %app_config.fleet.managed_title,
        poll_interval_secs = app_config.metrics.poll_interval_secs,
        "controller started"
    );

    if app_config.exporter.enabled {
        let app = routes::app(repo);
        let addr = format!("{}:{}", app_config.exporter.host, app_config.exporter.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Listening on http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        shutdown_signal().await;
    }

    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    let _ = controller_handle.await;
    Ok(())
}
