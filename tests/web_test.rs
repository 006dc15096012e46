mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{MockFactory, MockInverter, entry, supervisor_with};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;
use zevermon::web::{AppState, build_router};
use zevermon::{Config, Supervisor};

fn app_with(sup: Supervisor) -> axum::Router {
    build_router(AppState {
        supervisor: Arc::new(Mutex::new(sup)),
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_ok() {
    let (sup, _dir) = supervisor_with(Config::default(), MockFactory::new());
    let app = app_with(sup);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_reports_empty_registry() {
    let (sup, _dir) = supervisor_with(Config::default(), MockFactory::new());
    let app = app_with(sup);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["inverter_count"], 0);
    assert_eq!(json["running_count"], 0);
    assert!(json.get("version").is_some());
}

#[tokio::test]
async fn inverter_detail_includes_sensor_values_when_running() {
    let factory = MockFactory::new();
    factory.add("h1", MockInverter::new("ZS1")).await;
    let mut config = Config::default();
    config.inverters.push(entry("h1", "ZS1"));

    let (mut sup, _dir) = supervisor_with(config, factory);
    sup.start_entry("ZS1").await.unwrap();
    let app = app_with(sup);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/inverters/ZS1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["running"], true);
    assert_eq!(json["available"], true);
    assert_eq!(json["phase"], "idle");
    assert_eq!(json["sensors"]["current_power"], 101);
    assert!(json["sensors"].get("daily_energy").is_some());
    assert!(json["sensors"].get("status").is_some());
    assert!(json["sensors"].get("cloud_status").is_some());
    assert_eq!(json["manufacturer"], "ZeverSolar");
    assert_eq!(json["model"], "Universal Inverter Device");
    assert_eq!(json["name"], "ZeverSolar inverter 'ZS1'");
    assert_eq!(json["hardware_version"], "M11");
}

#[tokio::test]
async fn unknown_inverter_returns_404() {
    let (sup, _dir) = supervisor_with(Config::default(), MockFactory::new());
    let app = app_with(sup);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/inverters/ZS-NOPE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_new_inverter_starts_polling() {
    let factory = MockFactory::new();
    factory.add("192.168.1.60", MockInverter::new("ZS9")).await;

    let (sup, _dir) = supervisor_with(Config::default(), factory);
    let app = app_with(sup);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/inverters")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"host":"192.168.1.60"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["serial_number"], "ZS9");
    assert_eq!(json["running"], true);
}

#[tokio::test]
async fn register_duplicate_returns_conflict() {
    let factory = MockFactory::new();
    factory.add("h1", MockInverter::new("ZS1")).await;
    // Same device reachable under a second address
    factory.add("h2", MockInverter::new("ZS1")).await;
    let mut config = Config::default();
    config.inverters.push(entry("h1", "ZS1"));

    let (sup, _dir) = supervisor_with(config, factory);
    let app = app_with(sup);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/inverters")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"host":"h2"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn power_control_forbidden_unless_enabled() {
    let factory = MockFactory::new();
    factory.add("h1", MockInverter::new("ZS1")).await;
    let mut config = Config::default();
    config.inverters.push(entry("h1", "ZS1"));

    let (sup, _dir) = supervisor_with(config, factory);
    let app = app_with(sup);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/inverters/ZS1/power/on")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn power_on_reaches_the_device() {
    let factory = MockFactory::new();
    let mock = MockInverter::new("ZS1");
    factory.add("h1", Arc::clone(&mock)).await;

    let mut config = Config::default();
    let mut enabled = entry("h1", "ZS1");
    enabled.allow_power_control = true;
    config.inverters.push(enabled);

    let (mut sup, _dir) = supervisor_with(config, factory);
    sup.start_entry("ZS1").await.unwrap();
    let app = app_with(sup);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/inverters/ZS1/power/on")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.commands().await, vec!["on"]);
}

#[tokio::test]
async fn unknown_power_action_returns_404() {
    let factory = MockFactory::new();
    let mut config = Config::default();
    config.inverters.push(entry("h1", "ZS1"));

    let (sup, _dir) = supervisor_with(config, factory);
    let app = app_with(sup);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/inverters/ZS1/power/toggle")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn options_rejects_bad_intervals() {
    let factory = MockFactory::new();
    let mut config = Config::default();
    config.inverters.push(entry("h1", "ZS1"));

    let (sup, _dir) = supervisor_with(config, factory);
    let app = app_with(sup);

    // Below range
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/inverters/ZS1/options")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"poll_interval_secs":5}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Absent
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/inverters/ZS1/options")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn options_accepts_valid_interval() {
    let factory = MockFactory::new();
    let mut config = Config::default();
    config.inverters.push(entry("h1", "ZS1"));

    let (sup, _dir) = supervisor_with(config, factory);
    let app = app_with(sup);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/inverters/ZS1/options")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"poll_interval_secs":300}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["poll_interval_secs"], 300);
}

#[tokio::test]
async fn refresh_requires_running_inverter() {
    let factory = MockFactory::new();
    let mut config = Config::default();
    config.inverters.push(entry("h1", "ZS1"));

    let (sup, _dir) = supervisor_with(config, factory);
    let app = app_with(sup);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/inverters/ZS1/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn refresh_fetches_once_more() {
    let factory = MockFactory::new();
    let mock = MockInverter::new("ZS1");
    factory.add("h1", Arc::clone(&mock)).await;
    let mut config = Config::default();
    config.inverters.push(entry("h1", "ZS1"));

    let (mut sup, _dir) = supervisor_with(config, factory);
    sup.start_entry("ZS1").await.unwrap();
    let app = app_with(sup);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/inverters/ZS1/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(mock.calls(), 2);
}

#[tokio::test]
async fn config_endpoint_returns_sections() {
    let (sup, _dir) = supervisor_with(Config::default(), MockFactory::new());
    let app = app_with(sup);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/config")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json.get("inverters").is_some());
    assert!(json.get("web").is_some());
    assert!(json.get("logging").is_some());
}

#[tokio::test]
async fn events_stream_emits_poll_states() {
    use http_body_util::BodyExt as _;

    let factory = MockFactory::new();
    factory.add("h1", MockInverter::new("ZS1")).await;
    let mut config = Config::default();
    config.inverters.push(entry("h1", "ZS1"));

    let (mut sup, _dir) = supervisor_with(config, factory);
    sup.start_entry("ZS1").await.unwrap();
    let app = app_with(sup);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/inverters/ZS1/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ct = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    assert!(ct.contains("text/event-stream"));

    // The watch stream replays the current state immediately
    let mut body = response.into_body();
    let mut buf: Vec<u8> = Vec::new();
    let wait = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    if let Some(data) = frame.data_ref() {
                        buf.extend_from_slice(data);
                        if buf
                            .windows(b"event: poll".len())
                            .any(|w| w == b"event: poll")
                        {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    })
    .await;
    assert!(wait.is_ok(), "timed out waiting for SSE poll event");

    let s = String::from_utf8_lossy(&buf);
    assert!(s.contains("event: poll"), "missing named event: {}", s);
    assert!(s.contains("last_success"), "missing state payload: {}", s);
}

#[tokio::test]
async fn events_for_stopped_inverter_returns_503() {
    let factory = MockFactory::new();
    let mut config = Config::default();
    config.inverters.push(entry("h1", "ZS1"));

    let (sup, _dir) = supervisor_with(config, factory);
    let app = app_with(sup);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/inverters/ZS1/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
