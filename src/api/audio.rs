//! Prompt-to-speech endpoint

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;

use super::ApiState;
use crate::Error;
use crate::pipeline::{InboundRequest, PCM_MIMETYPE};

/// Build the audio response router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/get_audio_response", post(get_audio_response))
        .with_state(state)
}

/// Answer a typed or spoken prompt with raw PCM speech
///
/// Accepts `application/json` (`{"prompt": "..."}`) or
/// `application/octet-stream` (PCM16 mono 16 kHz). Returns `audio/L16`.
async fn get_audio_response(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Error> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let request = InboundRequest::dispatch(content_type, body.to_vec())?;
    let audio = state.pipeline.run(request).await?;

    tracing::info!(bytes = audio.len(), "sending audio to client");
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, PCM_MIMETYPE)],
        audio.into_bytes(),
    )
        .into_response())
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if kind.is_client_error() {
            tracing::warn!(kind = kind.as_str(), status = status.as_u16(), error = %self, "request rejected");
        } else {
            tracing::error!(kind = kind.as_str(), status = status.as_u16(), error = %self, "request failed");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}
