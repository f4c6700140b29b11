//! Background collector and HTTP status API for Mi Flora sensors.
//!
//! This crate provides a service that:
//! - Polls configured Mi Flora sensors on their own intervals
//! - Serializes radio access across all sensors
//! - Exposes the latest readings and alerts through a read-only REST API
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/sensors` - Status of every configured sensor
//! - `GET /api/sensors/{name}` - Status of one sensor
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/flora/service.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//! enabled = true
//!
//! [radio]
//! cooldown_secs = 15
//! scan_timeout_secs = 30
//! discovery_attempts = 3
//!
//! [[sensors]]
//! name = "Basil"
//! address = "C4:7C:8D:6A:12:34"
//! poll_interval = 1800
//! humidity_alert_level = 15
//! low_light_alert_level = 100
//! low_battery_level = 10
//! ```

pub mod api;
pub mod collector;
pub mod config;
pub mod state;

pub use collector::{Collector, build_pollers};
pub use config::{Config, ConfigError, RadioConfig, SensorEntry, ServerConfig};
pub use state::AppState;
