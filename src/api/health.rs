//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub transcription: CheckResult,
    pub generation: CheckResult,
    pub synthesis: CheckResult,
}

/// Result of a single readiness check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl CheckResult {
    fn ok(provider: impl Into<String>) -> Self {
        Self {
            status: "ok",
            provider: Some(provider.into()),
        }
    }

    const fn unavailable() -> Self {
        Self {
            status: "unavailable",
            provider: None,
        }
    }
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - which engines are wired up?
///
/// A missing transcriber only disables the audio path, so it does not make
/// the gateway unready.
async fn ready(State(state): State<Arc<ApiState>>) -> Json<ReadinessResponse> {
    let pipeline = &state.pipeline;

    let transcription = pipeline
        .transcriber_name()
        .map_or_else(CheckResult::unavailable, CheckResult::ok);

    Json(ReadinessResponse {
        status: "ok",
        checks: ReadinessChecks {
            transcription,
            generation: CheckResult::ok(pipeline.generator_model()),
            synthesis: CheckResult::ok(pipeline.synthesizer_name()),
        },
    })
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router (needs state for checks)
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
