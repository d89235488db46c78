use super::*;

use axum::{http::StatusCode as AxumStatus, routing::get, Router};
use tokio::net::TcpListener;

#[test]
fn fast_ok_is_connected_green() {
    let report = StatusReport::from_response(200, Duration::from_millis(12), "localhost");

    assert_eq!(report.state, LinkState::Connected);
    assert_eq!(report.indicator, "#00AA00");
    assert_eq!(report.label(), "Connected to engine @ localhost");
    assert_eq!(report.latency_label(), "12.0 ms");
}

#[test]
fn moderate_and_slow_latency_bands() {
    let moderate = StatusReport::from_response(200, Duration::from_millis(250), "stage");
    assert_eq!(moderate.state, LinkState::Connected);
    assert_eq!(moderate.indicator, "#FFAA00");

    let slow = StatusReport::from_response(200, Duration::from_millis(800), "stage");
    assert_eq!(slow.state, LinkState::Slow);
    assert_eq!(slow.indicator, "#FF6600");
    assert_eq!(slow.label(), "Slow to engine @ stage");
}

#[test]
fn non_ok_status_reports_error_without_latency() {
    let report = StatusReport::from_response(503, Duration::from_millis(5), "stage");

    assert_eq!(report.state, LinkState::Error(Some(503)));
    assert_eq!(report.label(), "Error 503");
    assert_eq!(report.latency_label(), "-- ms");
    assert_eq!(report.indicator, "#FF0000");
}

async fn spawn_product(status: AxumStatus) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let app = Router::new().route("/api/v1/product", get(move || async move { status }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    port
}

fn probe_for(port: u16) -> HeartbeatProbe {
    let (_tx, rx) = watch::channel(Endpoint::new("127.0.0.1", port).expect("endpoint"));
    HeartbeatProbe::new(rx, Duration::from_secs(2)).expect("probe")
}

#[tokio::test]
async fn probe_reports_connected_engine() {
    let port = spawn_product(AxumStatus::OK).await;

    let report = probe_for(port).check().await;

    assert!(matches!(report.state, LinkState::Connected | LinkState::Slow));
    assert!(report.latency_ms > 0.0);
    assert_eq!(report.host, "127.0.0.1");
}

#[tokio::test]
async fn probe_reports_engine_error_status() {
    let port = spawn_product(AxumStatus::SERVICE_UNAVAILABLE).await;

    let report = probe_for(port).check().await;

    assert_eq!(report.state, LinkState::Error(Some(503)));
}

#[tokio::test]
async fn probe_reports_offline_engine() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let report = probe_for(port).check().await;

    assert_eq!(report.state, LinkState::Offline);
    assert_eq!(report.latency_ms, 0.0);
}
