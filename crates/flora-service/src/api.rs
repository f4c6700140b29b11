//! Read-only REST API over the sensors' published state.
//!
//! Every handler reads the snapshot each poller last published, so requests
//! never wait on the radio.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/health` | Service liveness and uptime |
//! | GET | `/api/sensors` | Status of every sensor |
//! | GET | `/api/sensors/{name}` | Status of one sensor, by name or address |
//!
//! # Example
//!
//! ```ignore
//! use flora_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use time::OffsetDateTime;

use flora_core::{PollState, PollStats, SensorPoller, StatusReport};

use crate::state::AppState;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sensors", get(list_sensors))
        .route("/api/sensors/{name}", get(get_sensor))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub uptime_secs: i64,
    /// Number of configured sensors.
    pub sensors: usize,
    /// Sensors that have produced at least one reading.
    pub active_sensors: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        uptime_secs: state.uptime_secs(),
        sensors: state.pollers.len(),
        active_sensors: state
            .pollers
            .iter()
            .filter(|poller| poller.status().active())
            .count(),
    })
}

/// Status of one sensor.
#[derive(Debug, Serialize)]
pub struct SensorResponse {
    #[serde(flatten)]
    pub report: StatusReport,
    /// Where the poll cycle currently is.
    pub poll_state: PollState,
    pub stats: PollStats,
}

impl SensorResponse {
    fn from_poller(poller: &SensorPoller) -> Self {
        Self {
            report: poller.status().report(),
            poll_state: poller.state(),
            stats: poller.stats(),
        }
    }
}

/// List every sensor in configuration order.
async fn list_sensors(State(state): State<Arc<AppState>>) -> Json<Vec<SensorResponse>> {
    Json(
        state
            .pollers
            .iter()
            .map(|poller| SensorResponse::from_poller(poller))
            .collect(),
    )
}

/// Get one sensor by name or address.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] if no configured sensor matches.
async fn get_sensor(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SensorResponse>, AppError> {
    state
        .poller(&name)
        .map(|poller| Json(SensorResponse::from_poller(poller)))
        .ok_or_else(|| AppError::NotFound(format!("Sensor not found: {}", name)))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use flora_core::{
        FloraTransport, MockDevice, MockTransport, RadioArbiter, SensorConfig, SensorPoller,
    };

    use crate::config::Config;

    const BASIL: &str = "c4:7c:8d:6a:00:01";

    fn create_test_state() -> (Arc<AppState>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        transport.add_device(
            MockDevice::builder()
                .address(BASIL)
                .moisture(12)
                .light(300)
                .battery(9)
                .build(),
        );

        let shared: Arc<dyn FloraTransport> = transport.clone();
        let arbiter = RadioArbiter::new(std::time::Duration::ZERO);
        let pollers = vec![
            Arc::new(SensorPoller::new(
                SensorConfig::new(BASIL).name("Basil").humidity_alert_level(15),
                arbiter.clone(),
                Arc::clone(&shared),
            )),
            Arc::new(SensorPoller::new(
                SensorConfig::new("c4:7c:8d:6a:00:02").name("Fern"),
                arbiter,
                shared,
            )),
        ];
        (AppState::new(Config::default(), pollers), transport)
    }

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
        let app = router().with_state(state);
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _transport) = create_test_state();
        let (status, json) = get_json(state, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["timestamp"].is_string());
        assert_eq!(json["sensors"], 2);
        assert_eq!(json["active_sensors"], 0);
    }

    #[tokio::test]
    async fn test_list_sensors_before_first_poll() {
        let (state, _transport) = create_test_state();
        let (status, json) = get_json(state, "/api/sensors").await;

        assert_eq!(status, StatusCode::OK);
        let sensors = json.as_array().unwrap();
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0]["name"], "Basil");
        assert_eq!(sensors[0]["active"], false);
        assert_eq!(sensors[0]["firmware_version"], "0.0.0");
        assert_eq!(sensors[0]["humidity_alert"], "triggered");
        assert_eq!(sensors[0]["poll_state"], "idle");
        assert!(sensors[1].get("humidity_alert").is_none());
    }

    #[tokio::test]
    async fn test_get_sensor_after_poll() {
        let (state, _transport) = create_test_state();
        state.pollers[0].poll_once().await;

        let (status, json) = get_json(Arc::clone(&state), "/api/sensors/Basil").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["active"], true);
        assert_eq!(json["moisture"], 12);
        assert_eq!(json["light_level"], 300);
        assert_eq!(json["battery_level"], 9);
        assert_eq!(json["low_battery"], "low");
        assert_eq!(json["humidity_alert"], "triggered");
        assert_eq!(json["stats"]["updates"], 1);

        let (_, health) = get_json(state, "/api/health").await;
        assert_eq!(health["active_sensors"], 1);
    }

    #[tokio::test]
    async fn test_get_sensor_by_address() {
        let (state, _transport) = create_test_state();
        let (status, json) = get_json(state, "/api/sensors/C4:7C:8D:6A:00:02").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "Fern");
    }

    #[tokio::test]
    async fn test_get_unknown_sensor() {
        let (state, _transport) = create_test_state();
        let (status, json) = get_json(state, "/api/sensors/Rose").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Sensor not found: Rose");
    }

    #[tokio::test]
    async fn test_skipped_sensor_reports_stats() {
        let (state, transport) = create_test_state();
        transport.set_missed_discoveries(3);
        state.pollers[1].poll_once().await;

        let (_, json) = get_json(state, "/api/sensors/Fern").await;
        assert_eq!(json["poll_state"], "skipped");
        assert_eq!(json["stats"]["skips"], 1);
        assert_eq!(json["stats"]["consecutive_failures"], 1);
        assert_eq!(json["active"], false);
    }
}
