//! Error responses shared by the API handlers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

use livedeck_core::{
    CatalogError, ExplainError, GatewayError, IngestError, SessionError, SyncError,
};

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Present on 429: when the call may be retried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            retry_after_ms: None,
        }),
    )
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, message)
}

pub fn from_catalog(e: CatalogError) -> ApiError {
    let status = match e {
        CatalogError::FileNotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::InvalidFormat(_) | CatalogError::Empty(_) => StatusCode::BAD_REQUEST,
    };
    api_error(status, e.to_string())
}

pub fn from_session(e: SessionError) -> ApiError {
    let status = match e {
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::NoActiveSession => StatusCode::CONFLICT,
    };
    api_error(status, e.to_string())
}

pub fn from_ingest(e: IngestError) -> ApiError {
    match e {
        IngestError::NoActiveSession => api_error(StatusCode::CONFLICT, e.to_string()),
    }
}

pub fn from_gateway(e: GatewayError) -> ApiError {
    let status = if e.is_state_conflict() {
        StatusCode::CONFLICT
    } else {
        StatusCode::BAD_GATEWAY
    };
    api_error(status, e.to_string())
}

pub fn from_explain(e: ExplainError) -> ApiError {
    match e {
        ExplainError::RateLimited { retry_after_ms } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse {
                error: e.to_string(),
                retry_after_ms: Some(retry_after_ms),
            }),
        ),
        ExplainError::Gateway(inner) => from_gateway(inner),
        ExplainError::UnknownProduct(_) | ExplainError::NoScript(_) => {
            api_error(StatusCode::NOT_FOUND, e.to_string())
        }
        ExplainError::InvalidState { .. }
        | ExplainError::ProductMismatch(_)
        | ExplainError::NoActiveSession
        | ExplainError::NoSchedule
        | ExplainError::CallInFlight
        | ExplainError::Interrupted(_) => api_error(StatusCode::CONFLICT, e.to_string()),
    }
}

pub fn from_sync(e: SyncError) -> ApiError {
    let status = match e {
        SyncError::UnknownSurface(_) => StatusCode::NOT_FOUND,
        SyncError::Window(_) | SyncError::NotRunning => StatusCode::CONFLICT,
    };
    api_error(status, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_carries_retry_hint() {
        let (status, Json(body)) = from_explain(ExplainError::RateLimited {
            retry_after_ms: 700,
        });
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body.retry_after_ms, Some(700));
    }

    #[test]
    fn test_gateway_failure_is_bad_gateway() {
        let (status, _) = from_explain(ExplainError::Gateway(GatewayError::Decode(
            "bad".to_string(),
        )));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invalid_state_is_conflict() {
        let (status, _) = from_explain(ExplainError::InvalidState {
            op: "end",
            phase: "idle",
        });
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
