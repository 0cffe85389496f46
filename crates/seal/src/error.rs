//! Crate-level error type.

use common::ServiceError;
use thiserror::Error;

use crate::codec::CodecError;
use crate::key::KeyError;
use crate::payload::SerializationError;

/// Any failure surfaced by the sealing layer.
///
/// Errors are surfaced unchanged; nothing in this crate retries or
/// downgrades them. Use [`Error::caller_message`] (or the
/// [`ServiceError`] conversion) when the audience is untrusted.
#[derive(Debug, Error)]
pub enum Error {
    /// Key material is missing or too weak.
    #[error(transparent)]
    Configuration(#[from] KeyError),

    /// The envelope was rejected or could not be produced.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The structured value could not be encoded or decoded.
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Message safe for untrusted callers.
    ///
    /// A tag mismatch and a malformed envelope read identically.
    pub fn caller_message(&self) -> String {
        ServiceError::from(self).to_string()
    }
}

impl From<&Error> for ServiceError {
    fn from(err: &Error) -> Self {
        match err {
            Error::Configuration(_) => {
                ServiceError::Unavailable("encryption key is not configured".into())
            }
            Error::Codec(CodecError::UnsupportedVersion(v)) => ServiceError::UnsupportedVersion(*v),
            Error::Codec(CodecError::Authentication | CodecError::Malformed(_)) => {
                ServiceError::DecryptionFailed
            }
            Error::Codec(CodecError::AeadFailure) => ServiceError::Internal("encryption failed".into()),
            Error::Serialization(e) => ServiceError::BadRequest(e.to_string()),
        }
    }
}

impl From<Error> for ServiceError {
    fn from(err: Error) -> Self {
        ServiceError::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_mismatch_and_malformed_envelope_look_the_same() {
        let auth = Error::from(CodecError::Authentication);
        let malformed = Error::from(CodecError::Malformed("tag must be 16 bytes".into()));
        assert_eq!(auth.caller_message(), malformed.caller_message());
        assert_eq!(auth.caller_message(), "decryption failed");
        assert!(!malformed.caller_message().contains("tag"));
    }

    #[test]
    fn configuration_error_hides_secret_details() {
        let err = Error::from(KeyError::TooShort { len: 7, min: 32 });
        let svc = ServiceError::from(&err);
        assert_eq!(svc.http_status(), 503);
        assert!(!err.caller_message().contains('7'));
    }

    #[test]
    fn unsupported_version_is_named() {
        let svc = ServiceError::from(Error::from(CodecError::UnsupportedVersion(4)));
        assert!(matches!(svc, ServiceError::UnsupportedVersion(4)));
    }

    #[test]
    fn serialization_error_keeps_detail() {
        let json_err = serde_json::from_slice::<serde_json::Value>(b"[1,").unwrap_err();
        let err = Error::from(SerializationError::from(json_err));
        let svc = ServiceError::from(&err);
        assert_eq!(svc.http_status(), 400);
        assert!(svc.to_string().contains("line 1"));
    }

    #[test]
    fn internal_error_kind_is_preserved() {
        let err = Error::from(CodecError::Authentication);
        assert!(matches!(err, Error::Codec(CodecError::Authentication)));
        assert_eq!(err.to_string(), "envelope authentication failed");
    }
}
