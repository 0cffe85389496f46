//! Authenticated payload envelopes for request and response bodies.
//!
//! ```text
//! Value ──payload::serialize──► bytes ──codec::encrypt──► Envelope ──► wire
//! wire ──► Envelope ──codec::decrypt──► bytes ──payload::deserialize──► Value
//! ```
//!
//! [`dispatch::Dispatcher`] decides per call whether a body goes through that
//! pipeline at all.
//!
//! # Ciphertext format
//!
//! ```text
//! { "encrypted": true,
//!   "payload": { "version": 1, "nonce": <b64>, "ciphertext": <b64>, "tag": <b64> } }
//! ```
//!
//! The `version` field enables future algorithm migration without breaking
//! existing ciphertext.

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod key;
pub mod payload;

pub use codec::{Envelope, KeyedCodec, Sealer};
pub use dispatch::{Dispatcher, Inbound, Outbound, RequestMode};
pub use error::{Error, Result};
pub use key::{KeyMaterial, KeyStore};
