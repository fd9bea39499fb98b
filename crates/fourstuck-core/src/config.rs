//! Client tunables.
//!
//! Every field has a default, so an override only needs to name what it
//! changes.

use serde::{Deserialize, Serialize};

use crate::engine::spatial::SpatialConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    /// Base for the push channel, e.g. `ws://localhost:8000`.
    pub ws_base: String,
    /// Base for the REST collaborators, e.g. `http://localhost:8000`.
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ws_base: "ws://localhost:8000".to_string(),
            api_base: "http://localhost:8000".to_string(),
        }
    }
}

impl Endpoints {
    pub fn game_socket_url(&self, session_id: i64) -> String {
        format!("{}/ws/game/{session_id}", self.ws_base.trim_end_matches('/'))
    }
}

/// Linear backoff: attempt `n` waits `base_delay_ms * n`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u32,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> u32 {
        self.base_delay_ms.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CursorConfig {
    pub glyph_size: f64,
    pub stale_after_ms: f64,
    pub sweep_interval_ms: u32,
    pub throttle_ms: u32,
    pub min_move_px: f64,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            glyph_size: 20.0,
            stale_after_ms: 5000.0,
            sweep_interval_ms: 1000,
            throttle_ms: 50,
            min_move_px: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubmissionConfig {
    pub min_gap_ms: f64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self { min_gap_ms: 1000.0 }
    }
}

/// Retry for the transient "no puzzle yet" answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchRetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u32,
}

impl Default for FetchRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds the memory mapping stays visible.
    pub memory_reveal_secs: i64,
    pub spatial: SpatialConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_reveal_secs: 5,
            spatial: SpatialConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    pub reconnect: ReconnectPolicy,
    pub cursor: CursorConfig,
    pub submission: SubmissionConfig,
    pub puzzle_fetch: FetchRetryConfig,
    pub engines: EngineConfig,
}

impl ClientConfig {
    /// Parses a JSON override on top of the defaults and validates it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.engines.spatial.validate()?;
        Ok(config)
    }
}
