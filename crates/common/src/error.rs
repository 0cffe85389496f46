//! Common error types shared across crates.

use thiserror::Error;

/// Caller-facing service error.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`], [`ServiceError::DecryptionFailed`],
///   [`ServiceError::UnsupportedVersion`] → 400
/// - [`ServiceError::Unavailable`] → 503
/// - [`ServiceError::Internal`] → 500
///
/// The `Display` text of every variant is safe to hand to an untrusted caller.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed: invalid JSON, wrong body shape, or a
    /// payload that is not JSON-representable.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A tampered, truncated, or wrong-key envelope. Carries no detail so a
    /// tag mismatch cannot be told apart from a malformed envelope.
    #[error("decryption failed")]
    DecryptionFailed,

    /// The envelope declares a framing version this service does not know.
    #[error("unsupported payload version: {0}")]
    UnsupportedVersion(u64),

    /// Key material is missing or too weak to use.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::DecryptionFailed => 400,
            ServiceError::UnsupportedVersion(_) => 400,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for the `code` field of an error body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::DecryptionFailed => "decryption_failed",
            ServiceError::UnsupportedVersion(_) => "unsupported_version",
            ServiceError::Unavailable(_) => "service_unavailable",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_codes() {
        assert_eq!(ServiceError::BadRequest("x".into()).http_status(), 400);
        assert_eq!(ServiceError::DecryptionFailed.http_status(), 400);
        assert_eq!(ServiceError::UnsupportedVersion(2).http_status(), 400);
        assert_eq!(ServiceError::Unavailable("x".into()).http_status(), 503);
        assert_eq!(ServiceError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ServiceError::BadRequest("x".into()).code(), "bad_request");
        assert_eq!(ServiceError::DecryptionFailed.code(), "decryption_failed");
        assert_eq!(ServiceError::UnsupportedVersion(9).code(), "unsupported_version");
        assert_eq!(ServiceError::Unavailable("x".into()).code(), "service_unavailable");
        assert_eq!(ServiceError::Internal("x".into()).code(), "internal_error");
    }

    #[test]
    fn display_includes_message() {
        let e = ServiceError::BadRequest("expected value at line 1 column 1".into());
        assert!(e.to_string().contains("line 1 column 1"));
        assert_eq!(ServiceError::UnsupportedVersion(7).to_string(), "unsupported payload version: 7");
    }

    #[test]
    fn decryption_failed_is_generic() {
        assert_eq!(ServiceError::DecryptionFailed.to_string(), "decryption failed");
    }
}
