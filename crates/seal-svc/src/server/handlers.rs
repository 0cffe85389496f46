//! Axum request handlers for all service endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use common::{
    protocol::{DecryptResponse, EncryptResponse, ErrorResponse, HealthResponse},
    ServiceError,
};
use seal::{codec::CodecError, dispatch::Classified, payload, Error};
use tracing::{error, warn};

use super::state::AppState;

/// `POST /encrypt` — seal any JSON body into an envelope.
pub async fn encrypt(State(state): State<AppState>, body: Bytes) -> Response {
    let value = match payload::deserialize(&body) {
        Ok(v) => v,
        Err(e) => return error_response(Error::from(e).into()),
    };

    match state.dispatcher.seal_value(&value) {
        Ok(sealed) => (StatusCode::OK, Json(EncryptResponse::from(sealed))).into_response(),
        Err(e) => {
            log_failure(&e);
            error_response(e.into())
        }
    }
}

/// `POST /decrypt` — verify and open a sealed body.
///
/// The codec is only invoked once the body has been fully parsed into an
/// envelope; every shape violation is answered before any key is touched.
pub async fn decrypt(State(state): State<AppState>, body: Bytes) -> Response {
    let value = match payload::deserialize(&body) {
        Ok(v) => v,
        Err(e) => return error_response(Error::from(e).into()),
    };

    let envelope = match seal::dispatch::classify(&value) {
        Classified::Sealed(envelope) => envelope,
        Classified::Plain => {
            return error_response(ServiceError::BadRequest(
                "request body is not an encrypted payload".into(),
            ))
        }
        Classified::Malformed(e) => {
            let e = Error::from(e);
            log_failure(&e);
            return error_response(e.into());
        }
    };

    match state.dispatcher.open_envelope(&envelope) {
        Ok(data) => (StatusCode::OK, Json(DecryptResponse::new(data))).into_response(),
        Err(e) => {
            log_failure(&e);
            error_response(e.into())
        }
    }
}

/// `GET /health` — liveness and readiness check.
///
/// Returns `200 OK` when a payload secret is configured and
/// `503 Service Unavailable` otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let keys = state.keys();
    let key_configured = keys.is_configured();
    let key_ready = keys.is_ready();

    let (status_code, status_str) = if key_configured {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status_str.into(),
        key_configured,
        key_ready,
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

fn error_response(err: ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorResponse::new(err.code(), err.to_string());
    (status, Json(body)).into_response()
}

/// Full detail stays on this side of the boundary.
fn log_failure(err: &Error) {
    match err {
        Error::Configuration(e) => error!(error = %e, "payload key unavailable"),
        Error::Codec(CodecError::AeadFailure) => error!(error = %err, "encryption failed"),
        Error::Codec(e) => warn!(error = %e, "envelope rejected"),
        Error::Serialization(e) => warn!(error = %e, "payload is not valid JSON"),
    }
}
