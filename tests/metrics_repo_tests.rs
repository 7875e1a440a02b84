// HttpMetricsRepo against a stub feed served over loopback HTTP

mod common;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use common::{bind_local, serve};
use fleetscaler::config::MetricsConfig;
use fleetscaler::metrics_repo::{HttpMetricsRepo, MetricsSource};
use fleetscaler::models::PlayerReading;

const FEED: &str = r#"# TYPE steam_player_count gauge
steam_player_count{publisher="Valve",title="Dota 2"} 612345
steam_player_count{publisher="Valve",title="Deadlock"} 0
steam_player_count{publisher="Other",title="Elsewhere"} 99
"#;

async fn start_feed() -> String {
    let (listener, base) = bind_local().await;
    let app = Router::new()
        .route("/metrics", get(|| async { FEED }))
        .route(
            "/broken",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream down") }),
        );
    serve(listener, app);
    base
}

fn metrics_config(url: String) -> MetricsConfig {
    MetricsConfig {
        url,
        filter_field: "publisher".into(),
        filter_value: "Valve".into(),
        poll_interval_secs: 120,
        request_timeout_secs: 5,
    }
}

#[tokio::test]
async fn fetch_parses_matching_titles() {
    let base = start_feed().await;
    let repo = HttpMetricsRepo::new(&metrics_config(format!("{}/metrics", base))).unwrap();

    let readings = repo.fetch().await.unwrap();
    assert_eq!(
        readings,
        vec![
            PlayerReading::from_feed("Dota 2", 612345),
            PlayerReading::from_feed("Deadlock", 0),
        ]
    );
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let base = start_feed().await;
    let repo = HttpMetricsRepo::new(&metrics_config(format!("{}/broken", base))).unwrap();

    let err = repo.fetch().await.unwrap_err();
    assert!(err.to_string().contains("503"), "{err}");
}

#[tokio::test]
async fn unreachable_feed_is_an_error() {
    let (listener, base) = bind_local().await;
    drop(listener);
    let repo = HttpMetricsRepo::new(&metrics_config(format!("{}/metrics", base))).unwrap();
    assert!(repo.fetch().await.is_err());
}
