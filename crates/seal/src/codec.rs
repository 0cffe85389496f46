//! AES-256-GCM-SIV envelope encryption and decryption.
//!
//! **Algorithm choice:** AES-256-GCM-SIV (RFC 8452) with a fresh random 96-bit
//! nonce per envelope. The construction stays safe even if a nonce were ever
//! repeated, which only leaks equality of identical plaintexts.
//!
//! The tag is kept detached from the ciphertext so the wire form can carry
//! each field under its own name.

use std::sync::Arc;

use aes_gcm_siv::{
    aead::{AeadInPlace, KeyInit, OsRng},
    Aes256GcmSiv, Key, Nonce, Tag,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::protocol::WireEnvelope;
use thiserror::Error;
use zeroize::Zeroize;

use crate::error::Result;
use crate::key::{KeyMaterial, KeyStore};

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the authentication tag.
pub const TAG_LEN: usize = 16;

/// The only framing version this crate produces and accepts.
pub const CURRENT_VERSION: u32 = 1;

/// One encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Framing format version.
    pub version: u32,
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Raw ciphertext bytes, same length as the plaintext.
    pub ciphertext: Vec<u8>,
    /// Authentication tag over ciphertext, nonce and associated data.
    pub tag: [u8; TAG_LEN],
}

impl Envelope {
    /// Render the envelope as named base64 fields.
    pub fn to_wire(&self) -> WireEnvelope {
        WireEnvelope {
            version: self.version,
            nonce: STANDARD.encode(self.nonce),
            ciphertext: STANDARD.encode(&self.ciphertext),
            tag: STANDARD.encode(self.tag),
        }
    }

    /// Parse the wire form back into an [`Envelope`].
    ///
    /// The version is checked before any field is decoded.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedVersion`] for an unknown version and
    /// [`CodecError::Malformed`] if a field is not valid base64 or the nonce or
    /// tag has the wrong length.
    pub fn from_wire(wire: &WireEnvelope) -> std::result::Result<Self, CodecError> {
        if wire.version != CURRENT_VERSION {
            return Err(CodecError::UnsupportedVersion(wire.version.into()));
        }
        let nonce = decode_fixed::<NONCE_LEN>(&wire.nonce, "nonce")?;
        let tag = decode_fixed::<TAG_LEN>(&wire.tag, "tag")?;
        let ciphertext = STANDARD
            .decode(&wire.ciphertext)
            .map_err(|_| CodecError::Malformed("ciphertext is not valid base64".into()))?;

        Ok(Self {
            version: wire.version,
            nonce,
            ciphertext,
            tag,
        })
    }
}

fn decode_fixed<const N: usize>(
    field: &str,
    name: &str,
) -> std::result::Result<[u8; N], CodecError> {
    let bytes = STANDARD
        .decode(field)
        .map_err(|_| CodecError::Malformed(format!("{name} is not valid base64")))?;
    bytes
        .try_into()
        .map_err(|_| CodecError::Malformed(format!("{name} must be {N} bytes")))
}

/// Errors produced by the envelope codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The envelope declares a version this codec does not recognise.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u64),

    /// Tag verification failed: wrong key, tampered data, or mismatched
    /// associated data.
    #[error("envelope authentication failed")]
    Authentication,

    /// The wire form could not be turned into an envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// AES-GCM-SIV refused to encrypt (plaintext beyond the algorithm limit).
    #[error("aead operation failed")]
    AeadFailure,
}

/// Encrypt `plaintext` into a fresh [`Envelope`].
///
/// A random 96-bit nonce is drawn from the OS CSPRNG on every call.
///
/// # Errors
///
/// Returns [`CodecError::AeadFailure`] on an internal AEAD error (unreachable
/// for any plaintext that fits in memory).
pub fn encrypt(
    key: &KeyMaterial,
    plaintext: &[u8],
    associated_data: Option<&[u8]>,
) -> std::result::Result<Envelope, CodecError> {
    use aes_gcm_siv::aead::rand_core::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    seal_with_nonce(key, nonce, plaintext, associated_data)
}

fn seal_with_nonce(
    key: &KeyMaterial,
    nonce: [u8; NONCE_LEN],
    plaintext: &[u8],
    associated_data: Option<&[u8]>,
) -> std::result::Result<Envelope, CodecError> {
    let cipher = build_cipher(key);
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(
            Nonce::from_slice(&nonce),
            associated_data.unwrap_or_default(),
            &mut buffer,
        )
        .map_err(|_| {
            buffer.zeroize();
            CodecError::AeadFailure
        })?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(Envelope {
        version: CURRENT_VERSION,
        nonce,
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Verify and decrypt an [`Envelope`] back to plaintext bytes.
///
/// The version is validated before the tag is looked at. Nothing is returned
/// unless the tag verifies.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedVersion`] for an unknown version and
/// [`CodecError::Authentication`] if the tag does not verify.
pub fn decrypt(
    key: &KeyMaterial,
    envelope: &Envelope,
    associated_data: Option<&[u8]>,
) -> std::result::Result<Vec<u8>, CodecError> {
    if envelope.version != CURRENT_VERSION {
        return Err(CodecError::UnsupportedVersion(envelope.version.into()));
    }

    let cipher = build_cipher(key);
    let mut buffer = envelope.ciphertext.clone();
    match cipher.decrypt_in_place_detached(
        Nonce::from_slice(&envelope.nonce),
        associated_data.unwrap_or_default(),
        &mut buffer,
        Tag::from_slice(&envelope.tag),
    ) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            buffer.zeroize();
            Err(CodecError::Authentication)
        }
    }
}

fn build_cipher(key: &KeyMaterial) -> Aes256GcmSiv {
    Aes256GcmSiv::new(Key::<Aes256GcmSiv>::from_slice(key.as_bytes()))
}

// ---------------------------------------------------------------------------
// Sealer seam
// ---------------------------------------------------------------------------

/// Seal and open byte payloads under whatever key and context the
/// implementation is bound to.
#[cfg_attr(test, mockall::automock)]
pub trait Sealer: Send + Sync {
    /// Encrypt `plaintext` into an envelope.
    fn seal(&self, plaintext: &[u8]) -> Result<Envelope>;

    /// Verify and decrypt `envelope`.
    fn open(&self, envelope: &Envelope) -> Result<Vec<u8>>;
}

/// [`Sealer`] backed by the process [`KeyStore`] and an optional
/// associated-data context bound into every tag.
#[derive(Clone, Debug)]
pub struct KeyedCodec {
    keys: KeyStore,
    associated_data: Option<Arc<[u8]>>,
}

impl KeyedCodec {
    pub fn new(keys: KeyStore, associated_data: Option<Vec<u8>>) -> Self {
        Self {
            keys,
            associated_data: associated_data.map(Arc::from),
        }
    }

    /// The key store this codec draws from.
    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    fn associated_data(&self) -> Option<&[u8]> {
        self.associated_data.as_deref()
    }
}

impl Sealer for KeyedCodec {
    fn seal(&self, plaintext: &[u8]) -> Result<Envelope> {
        let key = self.keys.key()?;
        Ok(encrypt(key, plaintext, self.associated_data())?)
    }

    fn open(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        // Checked here as well so an unknown version never triggers derivation.
        if envelope.version != CURRENT_VERSION {
            return Err(CodecError::UnsupportedVersion(envelope.version.into()).into());
        }
        let key = self.keys.key()?;
        Ok(decrypt(key, envelope, self.associated_data())?)
    }
}
