//! Axum-based HTTP API for inverter status and control

use crate::button::ButtonKind;
use crate::config::InverterEntry;
use crate::error::ZevermonError;
use crate::sensor::{MANUFACTURER, MODEL, device_name, project_all};
use crate::supervisor::Supervisor;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Mutex<Supervisor>>,
}

#[derive(Deserialize)]
pub struct RegisterBody {
    pub host: String,
}

#[derive(Deserialize)]
pub struct OptionsBody {
    pub poll_interval_secs: Option<u64>,
}

fn error_response(e: &ZevermonError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match e {
        ZevermonError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ZevermonError::Duplicate { .. } => StatusCode::CONFLICT,
        ZevermonError::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ZevermonError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ZevermonError::UpdateFailed { .. }
        | ZevermonError::Device { .. }
        | ZevermonError::Protocol { .. } => StatusCode::BAD_GATEWAY,
        // Config errors reach handlers only as unknown-entry lookups
        ZevermonError::Config { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({"error": e.to_string()})))
}

fn unknown_inverter(serial: &str) -> ZevermonError {
    ZevermonError::config(format!("unknown inverter {}", serial))
}

fn not_running(serial: &str) -> ZevermonError {
    ZevermonError::not_ready(format!("inverter {} is not running", serial))
}

fn inverter_json(sup: &Supervisor, entry: &InverterEntry) -> serde_json::Value {
    let mut item = serde_json::json!({
        "serial_number": entry.serial_number,
        "name": device_name(&entry.serial_number),
        "manufacturer": MANUFACTURER,
        "model": MODEL,
        "host": entry.host,
        "poll_interval_secs": entry.poll_interval_secs,
        "allow_power_control": entry.allow_power_control,
        "running": false,
        "available": false,
    });

    if let Some(coordinator) = sup.coordinator(&entry.serial_number) {
        let poll = coordinator.state();
        item["running"] = serde_json::json!(true);
        item["phase"] = serde_json::json!(poll.phase);
        item["last_success"] = serde_json::json!(poll.last_success);
        if let Some(err) = &poll.last_error {
            item["last_error"] = serde_json::json!(err);
        }
        if let Some(snapshot) = &poll.snapshot {
            item["available"] = serde_json::json!(true);
            item["fetched_at"] = serde_json::json!(snapshot.fetched_at);
            item["hardware_version"] = serde_json::json!(snapshot.hardware_version);
            item["software_version"] = serde_json::json!(snapshot.software_version);
            item["sensors"] = serde_json::Value::Object(project_all(snapshot));
        }
    }
    item
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let sup = state.supervisor.lock().await;
    let inverters: Vec<serde_json::Value> = sup
        .config()
        .inverters
        .iter()
        .map(|entry| inverter_json(&sup, entry))
        .collect();

    Json(serde_json::json!({
        "version": env!("APP_VERSION"),
        "inverter_count": inverters.len(),
        "running_count": sup.running_count(),
        "inverters": inverters,
    }))
}

async fn get_inverter(State(state): State<AppState>, Path(serial): Path<String>) -> Response {
    let sup = state.supervisor.lock().await;
    match sup.config().entry(&serial) {
        Some(entry) => Json(inverter_json(&sup, entry)).into_response(),
        None => error_response(&unknown_inverter(&serial)).into_response(),
    }
}

async fn register_inverter(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Response {
    let mut sup = state.supervisor.lock().await;
    let entry = match sup.register_inverter(&body.host).await {
        Ok(entry) => entry,
        Err(e) => return error_response(&e).into_response(),
    };

    // The entry is persisted either way; a failed first refresh leaves it
    // configured but not running.
    let serial = entry.serial_number.clone();
    match sup.start_entry(&serial).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "serial_number": serial,
                "host": entry.host,
                "running": true,
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "serial_number": serial,
                "host": entry.host,
                "running": false,
                "start_error": e.to_string(),
            })),
        )
            .into_response(),
    }
}

async fn refresh_inverter(State(state): State<AppState>, Path(serial): Path<String>) -> Response {
    // The refresh itself runs off the supervisor lock
    let coordinator = {
        let sup = state.supervisor.lock().await;
        if sup.config().entry(&serial).is_none() {
            return error_response(&unknown_inverter(&serial)).into_response();
        }
        sup.coordinator(&serial)
    };

    let Some(coordinator) = coordinator else {
        return error_response(&not_running(&serial)).into_response();
    };
    match coordinator.refresh_now().await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "ok": true,
                "fetched_at": snapshot.fetched_at,
            })),
        )
            .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

async fn power_control(
    State(state): State<AppState>,
    Path((serial, action)): Path<(String, String)>,
) -> Response {
    let button = match action.as_str() {
        "on" => ButtonKind::PowerOn,
        "off" => ButtonKind::PowerOff,
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": format!("unknown power action {}", action)})),
            )
                .into_response();
        }
    };

    let (allowed, coordinator) = {
        let sup = state.supervisor.lock().await;
        match sup.config().entry(&serial) {
            Some(entry) => (entry.allow_power_control, sup.coordinator(&serial)),
            None => return error_response(&unknown_inverter(&serial)).into_response(),
        }
    };
    if !allowed {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": format!("power control is disabled for inverter {}", serial),
            })),
        )
            .into_response();
    }
    let Some(coordinator) = coordinator else {
        return error_response(&not_running(&serial)).into_response();
    };

    match button.press(coordinator.client().as_ref()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"ok": true, "action": button.key()})),
        )
            .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

async fn set_options(
    State(state): State<AppState>,
    Path(serial): Path<String>,
    Json(body): Json<OptionsBody>,
) -> Response {
    let mut sup = state.supervisor.lock().await;
    if sup.config().entry(&serial).is_none() {
        return error_response(&unknown_inverter(&serial)).into_response();
    }
    match sup.apply_poll_interval(&serial, body.poll_interval_secs).await {
        Ok(()) => {
            let secs = sup.config().entry(&serial).map(|e| e.poll_interval_secs);
            (
                StatusCode::OK,
                Json(serde_json::json!({"ok": true, "poll_interval_secs": secs})),
            )
                .into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let sup = state.supervisor.lock().await;
    let json = serde_json::to_value(sup.config().clone())
        .unwrap_or(serde_json::json!({"error":"serialization"}));
    Json(json)
}

async fn events(State(state): State<AppState>, Path(serial): Path<String>) -> Response {
    let coordinator = {
        let sup = state.supervisor.lock().await;
        if sup.config().entry(&serial).is_none() {
            return error_response(&unknown_inverter(&serial)).into_response();
        }
        sup.coordinator(&serial)
    };
    let Some(coordinator) = coordinator else {
        return error_response(&not_running(&serial)).into_response();
    };

    let rx = coordinator.subscribe();
    let stream = tokio_stream::wrappers::WatchStream::new(rx).map(|poll| {
        let mut payload = serde_json::json!({
            "phase": poll.phase,
            "last_success": poll.last_success,
            "generation": poll.generation,
        });
        if let Some(err) = &poll.last_error {
            payload["last_error"] = serde_json::json!(err);
        }
        if let Some(snapshot) = &poll.snapshot {
            payload["fetched_at"] = serde_json::json!(snapshot.fetched_at);
            payload["sensors"] = serde_json::Value::Object(project_all(snapshot));
        }
        Ok::<Event, std::convert::Infallible>(
            Event::default().event("poll").data(payload.to_string()),
        )
    });
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/config", get(get_config))
        .route("/api/inverters", post(register_inverter))
        .route("/api/inverters/{serial}", get(get_inverter))
        .route("/api/inverters/{serial}/refresh", post(refresh_inverter))
        .route("/api/inverters/{serial}/power/{action}", post(power_control))
        .route("/api/inverters/{serial}/options", put(set_options))
        .route("/api/inverters/{serial}/events", get(events))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(supervisor: Arc<Mutex<Supervisor>>, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState { supervisor };
    let router = build_router(state);

    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let (addr, parsed_ok): (SocketAddr, bool) = match host.parse::<IpAddr>() {
        Ok(ip) => (SocketAddr::new(ip, port), true),
        Err(_) => (([127, 0, 0, 1], port).into(), false),
    };
    if !parsed_ok {
        logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API under /api)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router).await?;
    Ok(())
}
