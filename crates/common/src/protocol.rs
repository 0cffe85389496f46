//! Request and response types exchanged between components.
//!
//! These types are serialised as JSON over the public HTTP API and by any
//! client that applies the dispatch policy before transmission.

use serde::{Deserialize, Serialize};

/// `Content-Type` of every sealed body, whatever the original payload was.
pub const SEALED_CONTENT_TYPE: &str = "application/json";

// ---------------------------------------------------------------------------
// Transport container
// ---------------------------------------------------------------------------

/// Transmission form of one envelope.
///
/// Every binary field is standard padded base64 and carried under its own
/// name so the framing stays unambiguous as the format evolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Framing format version.
    pub version: u32,
    /// base64(nonce).
    pub nonce: String,
    /// base64(ciphertext), without the tag.
    pub ciphertext: String,
    /// base64(authentication tag).
    pub tag: String,
}

/// Body of a protected request or response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBody {
    /// Marker telling the receiver to unwrap `payload`. Always `true` when
    /// produced by this crate.
    pub encrypted: bool,
    /// The envelope fields.
    pub payload: WireEnvelope,
}

impl SealedBody {
    /// Wrap `payload` with the `encrypted: true` marker.
    pub fn new(payload: WireEnvelope) -> Self {
        Self {
            encrypted: true,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Encrypt endpoint
// ---------------------------------------------------------------------------

/// Successful response body for `POST /encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub success: bool,
    pub encrypted: bool,
    /// The envelope the request body was sealed into.
    pub payload: WireEnvelope,
}

impl From<SealedBody> for EncryptResponse {
    fn from(body: SealedBody) -> Self {
        Self {
            success: true,
            encrypted: body.encrypted,
            payload: body.payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Decrypt endpoint
// ---------------------------------------------------------------------------

/// Successful response body for `POST /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    pub success: bool,
    /// The structured value recovered from the envelope.
    pub data: serde_json::Value,
}

impl DecryptResponse {
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether a shared secret was supplied at startup.
    pub key_configured: bool,
    /// Whether the key has already been derived from the secret.
    pub key_ready: bool,
}
