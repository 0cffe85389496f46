//! Dispatch policy: when to wrap an outgoing body and when to unwrap an
//! incoming one.
//!
//! The caller decides per request with [`RequestMode`]; the policy never
//! infers protection from the shape of the payload. Inbound bodies are
//! unwrapped only when they carry `encrypted: true` together with a
//! well-formed envelope.

use common::protocol::{SealedBody, WireEnvelope, SEALED_CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::codec::{CodecError, Envelope, KeyedCodec, Sealer, CURRENT_VERSION};
use crate::error::Result;
use crate::payload::{self, SerializationError};

/// Per-call protection decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Serialise, encrypt and wrap the body.
    Protected,
    /// Send the body untouched.
    Plain,
}

/// A body ready for transmission.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Sealed(SealedBody),
    Plain(Value),
}

impl Outbound {
    /// `Content-Type` the transport must use, or `None` to keep the caller's.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Outbound::Sealed(_) => Some(SEALED_CONTENT_TYPE),
            Outbound::Plain(_) => None,
        }
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, Outbound::Sealed(_))
    }

    /// The JSON body to put on the wire.
    pub fn into_value(self) -> Result<Value> {
        match self {
            Outbound::Sealed(body) => {
                Ok(serde_json::to_value(body).map_err(SerializationError::from)?)
            }
            Outbound::Plain(value) => Ok(value),
        }
    }
}

/// A received body after the policy has looked at it.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The body was sealed and has been verified and decrypted.
    Unwrapped(Value),
    /// The body was not sealed and is returned as received.
    Plain(Value),
}

impl Inbound {
    pub fn was_sealed(&self) -> bool {
        matches!(self, Inbound::Unwrapped(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            Inbound::Unwrapped(v) | Inbound::Plain(v) => v,
        }
    }
}

/// Shape of a body as seen by [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// No `encrypted: true` marker.
    Plain,
    /// Marker present and the envelope parsed.
    Sealed(Envelope),
    /// Marker present but the envelope is unusable.
    Malformed(CodecError),
}

/// Inspect a transport body without touching any key.
///
/// The envelope version is read first, so an unknown version is reported as
/// [`CodecError::UnsupportedVersion`] even if the rest of its fields differ.
pub fn classify(body: &Value) -> Classified {
    if body.get("encrypted").and_then(Value::as_bool) != Some(true) {
        return Classified::Plain;
    }

    let Some(payload) = body.get("payload").filter(|p| p.is_object()) else {
        return Classified::Malformed(CodecError::Malformed("payload must be an object".into()));
    };
    let Some(version) = payload.get("version").and_then(Value::as_u64) else {
        return Classified::Malformed(CodecError::Malformed(
            "version must be a non-negative integer".into(),
        ));
    };
    if version != u64::from(CURRENT_VERSION) {
        return Classified::Malformed(CodecError::UnsupportedVersion(version));
    }

    let wire: WireEnvelope = match serde_json::from_value(payload.clone()) {
        Ok(w) => w,
        Err(e) => return Classified::Malformed(CodecError::Malformed(e.to_string())),
    };
    match Envelope::from_wire(&wire) {
        Ok(envelope) => Classified::Sealed(envelope),
        Err(e) => Classified::Malformed(e),
    }
}

/// Applies the policy on top of a [`Sealer`].
#[derive(Debug, Clone)]
pub struct Dispatcher<S = KeyedCodec> {
    sealer: S,
}

impl<S: Sealer> Dispatcher<S> {
    pub fn new(sealer: S) -> Self {
        Self { sealer }
    }

    pub fn sealer(&self) -> &S {
        &self.sealer
    }

    /// Serialise and seal `value` into a transport container.
    pub fn seal_value(&self, value: &Value) -> Result<SealedBody> {
        let plaintext = Zeroizing::new(payload::serialize(value)?);
        let envelope = self.sealer.seal(&plaintext)?;
        debug!(ciphertext_len = envelope.ciphertext.len(), "payload sealed");
        Ok(SealedBody::new(envelope.to_wire()))
    }

    /// Verify, decrypt and deserialise one envelope.
    pub fn open_envelope(&self, envelope: &Envelope) -> Result<Value> {
        let plaintext = Zeroizing::new(self.sealer.open(envelope)?);
        Ok(payload::deserialize(&plaintext)?)
    }

    /// Prepare an outgoing body according to `mode`.
    pub fn outgoing(&self, body: Value, mode: RequestMode) -> Result<Outbound> {
        match mode {
            RequestMode::Plain => Ok(Outbound::Plain(body)),
            RequestMode::Protected => Ok(Outbound::Sealed(self.seal_value(&body)?)),
        }
    }

    /// Unwrap a received body if, and only if, it is a well-formed sealed body.
    ///
    /// # Errors
    ///
    /// Verification, decryption and deserialisation failures of a well-formed
    /// envelope propagate, as does an unsupported envelope version. A marker
    /// without a parseable envelope is treated as plaintext.
    pub fn incoming(&self, body: Value) -> Result<Inbound> {
        match classify(&body) {
            Classified::Plain => Ok(Inbound::Plain(body)),
            Classified::Sealed(envelope) => Ok(Inbound::Unwrapped(self.open_envelope(&envelope)?)),
            Classified::Malformed(CodecError::UnsupportedVersion(v)) => {
                Err(CodecError::UnsupportedVersion(v).into())
            }
            Classified::Malformed(e) => {
                warn!(error = %e, "encrypted marker without a usable envelope; treating body as plaintext");
                Ok(Inbound::Plain(body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MockSealer;
    use crate::error::Error;
    use crate::key::{KeyError, KeyStore};
    use serde_json::json;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(KeyedCodec::new(KeyStore::new(Some(SECRET.to_vec())), None))
    }

    fn sealed_quiz() -> Value {
        json!({
            "encrypted": true,
            "payload": {
                "version": 1,
                "nonce": "AAECAwQFBgcICQoL",
                "ciphertext": "ZyEJ/sjiZUkdxUi/ouUFMbsAAsPxliIYLoAOLwZH",
                "tag": "A4+E6oPXVDkedDegiV231w=="
            }
        })
    }

    fn never_opening_sealer() -> MockSealer {
        let mut sealer = MockSealer::new();
        sealer.expect_open().never();
        sealer.expect_seal().never();
        sealer
    }

    #[test]
    fn plain_mode_passes_body_through() {
        let body = json!({"message": "hello", "encrypted": false});
        let out = dispatcher().outgoing(body.clone(), RequestMode::Plain).unwrap();
        assert!(!out.is_sealed());
        assert_eq!(out.content_type(), None);
        assert_eq!(out.into_value().unwrap(), body);
    }

    #[test]
    fn protected_mode_wraps_body() {
        let d = dispatcher();
        let body = json!({"quizTitle": "Algebra Basics"});
        let out = d.outgoing(body.clone(), RequestMode::Protected).unwrap();
        assert_eq!(out.content_type(), Some("application/json"));

        let wire = out.into_value().unwrap();
        assert_eq!(wire["encrypted"], true);
        assert_eq!(wire["payload"]["version"], 1);
        for field in ["nonce", "ciphertext", "tag"] {
            assert!(wire["payload"][field].is_string(), "missing {field}");
        }

        assert_eq!(d.incoming(wire).unwrap(), Inbound::Unwrapped(body));
    }

    #[test]
    fn protected_binary_payload_round_trips() {
        let d = dispatcher();
        let image = [0u8, 1, 2, 253, 254, 255];
        let body = json!({"image": payload::binary_to_value(&image), "lang": "en"});
        let wire = d
            .outgoing(body, RequestMode::Protected)
            .unwrap()
            .into_value()
            .unwrap();
        let back = d.incoming(wire).unwrap().into_value();
        assert_eq!(payload::value_to_binary(&back["image"]).unwrap(), image);
    }

    #[test]
    fn incoming_golden_vector_unwraps() {
        let inbound = dispatcher().incoming(sealed_quiz()).unwrap();
        assert!(inbound.was_sealed());
        assert_eq!(inbound.into_value(), json!({"quizTitle": "Algebra Basics"}));
    }

    #[test]
    fn incoming_without_marker_is_plain() {
        let d = Dispatcher::new(never_opening_sealer());
        for body in [
            json!({"quizTitle": "Algebra Basics"}),
            json!({"encrypted": false, "payload": {"version": 1}}),
            json!({"encrypted": "true"}),
            json!([1, 2, 3]),
            json!("text"),
        ] {
            assert_eq!(d.incoming(body.clone()).unwrap(), Inbound::Plain(body));
        }
    }

    #[test]
    fn truncated_ciphertext_never_reaches_the_codec() {
        let mut body = sealed_quiz();
        body["payload"]["ciphertext"] = json!("ZyEJ/sjiZUkdxUi/ouUFMbsAAsPxliIYLoAOLwZ");
        assert!(matches!(classify(&body), Classified::Malformed(CodecError::Malformed(_))));

        let d = Dispatcher::new(never_opening_sealer());
        assert_eq!(d.incoming(body.clone()).unwrap(), Inbound::Plain(body));
    }

    #[test]
    fn classify_rejects_incomplete_payloads() {
        let cases = [
            json!({"encrypted": true}),
            json!({"encrypted": true, "payload": "blob"}),
            json!({"encrypted": true, "payload": {"nonce": "AAECAwQFBgcICQoL"}}),
            json!({"encrypted": true, "payload": {"version": -1}}),
            json!({"encrypted": true, "payload": {"version": 1, "nonce": 5, "ciphertext": "", "tag": ""}}),
        ];
        for body in cases {
            assert!(
                matches!(classify(&body), Classified::Malformed(CodecError::Malformed(_))),
                "accepted {body}"
            );
        }
    }

    #[test]
    fn unknown_version_is_reported_not_opened() {
        let body = json!({"encrypted": true, "payload": {"version": 2, "blob": "..."}});
        assert_eq!(
            classify(&body),
            Classified::Malformed(CodecError::UnsupportedVersion(2))
        );

        let d = Dispatcher::new(never_opening_sealer());
        assert!(matches!(
            d.incoming(body),
            Err(Error::Codec(CodecError::UnsupportedVersion(2)))
        ));
    }

    #[test]
    fn oversized_version_is_reported_as_received() {
        let version = u64::from(u32::MAX) + 7;
        let body = json!({"encrypted": true, "payload": {"version": version}});
        assert_eq!(
            classify(&body),
            Classified::Malformed(CodecError::UnsupportedVersion(version))
        );
    }

    #[test]
    fn too_deep_body_is_refused_before_sealing() {
        let body = (0..=payload::MAX_DEPTH).fold(json!("x"), |inner, _| json!([inner]));
        let d = Dispatcher::new(never_opening_sealer());
        assert!(matches!(
            d.outgoing(body, RequestMode::Protected),
            Err(Error::Serialization(payload::SerializationError::TooDeep { .. }))
        ));
    }

    #[test]
    fn tampered_envelope_is_an_authentication_error() {
        let mut body = sealed_quiz();
        body["payload"]["tag"] = json!("A4+E6oPXVDkedDegiV231A==");
        assert!(matches!(
            dispatcher().incoming(body),
            Err(Error::Codec(CodecError::Authentication))
        ));
    }

    #[test]
    fn sealer_errors_propagate_unchanged() {
        let mut sealer = MockSealer::new();
        sealer
            .expect_seal()
            .times(1)
            .returning(|_| Err(KeyError::Missing.into()));
        let d = Dispatcher::new(sealer);
        assert!(matches!(
            d.outgoing(json!({"a": 1}), RequestMode::Protected),
            Err(Error::Configuration(KeyError::Missing))
        ));
    }

    #[test]
    fn plain_mode_never_touches_the_sealer() {
        let d = Dispatcher::new(never_opening_sealer());
        assert!(d.outgoing(json!({"a": 1}), RequestMode::Plain).is_ok());
    }

    #[test]
    fn authenticated_non_json_plaintext_is_a_serialization_error() {
        let mut sealer = MockSealer::new();
        sealer
            .expect_open()
            .times(1)
            .returning(|_| Ok(b"not json".to_vec()));
        let d = Dispatcher::new(sealer);
        let Classified::Sealed(envelope) = classify(&sealed_quiz()) else {
            panic!("golden body should classify as sealed");
        };
        assert!(matches!(
            d.open_envelope(&envelope),
            Err(Error::Serialization(_))
        ));
    }
}
