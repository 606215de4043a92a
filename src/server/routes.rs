//! Route handlers.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::AppState;
use crate::error::PipelineError;
use crate::events::LogSink;
use crate::pipeline::RunRequest;
use crate::provision;
use crate::storage::HISTORY_PAGE_SIZE;

/// JSON error payload with an HTTP status reflecting client vs. server fault.
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.error });
        if let Some(details) = self.details {
            body["details"] = json!(details);
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NoEntryPoint => {
                ApiError::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            PipelineError::CloneFailed(details) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to clone repository")
                    .with_details(details)
            }
            PipelineError::AgentFailed(details) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to run profiler")
                    .with_details(details)
            }
            PipelineError::ReportUnparseable { raw } => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to parse agent output")
                    .with_details(raw)
            }
            PipelineError::Io(e) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

/// `POST /profile` — synchronous flow.
pub async fn profile(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    if request.repo_url.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "repo_url is required"));
    }

    let outcome = state.orchestrator.run_sync(&request).await?;
    Ok(Json(outcome).into_response())
}

/// Query parameters for the streaming flow.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    repo_url: String,
    #[serde(default = "default_stream_version")]
    version: String,
}

fn default_stream_version() -> String {
    provision::DEFAULT_INTERPRETER.to_string()
}

/// `GET /stream-profile` — streaming flow over SSE.
///
/// Emits `log` events as the run progresses, then exactly one terminal
/// `complete` event. A failed run closes the channel without the terminal
/// event; the caller infers an incomplete run from closure.
pub async fn stream_profile(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if params.repo_url.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "repo_url is required"));
    }

    let request = RunRequest::new(params.repo_url).with_version(params.version);
    let (sink, mut rx) = LogSink::channel();
    let orchestrator = state.orchestrator.clone();

    let run = tokio::spawn(async move { orchestrator.run_streaming(&request, &sink).await });

    let stream = async_stream::stream! {
        while let Some(line) = rx.recv().await {
            yield Ok::<Event, Infallible>(Event::default().event("log").data(line));
        }

        // The channel closed, so the run has reached its end one way or the
        // other; the terminal event is emitted only for a completed run.
        match run.await {
            Ok(Some(outcome)) => {
                match serde_json::to_string(&outcome) {
                    Ok(payload) => yield Ok(Event::default().event("complete").data(payload)),
                    Err(e) => error!(error = %e, "Failed to encode terminal event"),
                }
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "Streaming run task panicked"),
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `GET /history` — the most recent runs, newest first.
pub async fn history(State(state): State<AppState>) -> Result<Response, ApiError> {
    let records = state
        .store
        .recent(HISTORY_PAGE_SIZE)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch history");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch history")
        })?;

    Ok(Json(records).into_response())
}

/// `DELETE /history` — unconditionally clears all records.
pub async fn clear_history(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.store.clear().await.map_err(|e| {
        error!(error = %e, "Failed to clear history");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to clear history")
    })?;

    Ok(Json(json!({ "message": "History cleared successfully" })).into_response())
}

/// `GET /versions` — runtime versions resolvable on this host.
pub async fn versions() -> Response {
    Json(provision::available_versions().await).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_maps_no_entry_point_to_400() {
        let err: ApiError = PipelineError::NoEntryPoint.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_api_error_maps_clone_failure_to_500_with_details() {
        let err: ApiError = PipelineError::CloneFailed("fatal: not found".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.details.as_deref(), Some("fatal: not found"));
    }

    #[test]
    fn test_api_error_preserves_raw_agent_output() {
        let err: ApiError = PipelineError::ReportUnparseable {
            raw: "garbage".to_string(),
        }
        .into();
        assert_eq!(err.details.as_deref(), Some("garbage"));
    }

    #[test]
    fn test_stream_params_default_version() {
        let params: StreamParams =
            serde_json::from_str(r#"{"repo_url": "https://example.com/x.git"}"#).unwrap();
        assert_eq!(params.version, "python3");
    }
}
