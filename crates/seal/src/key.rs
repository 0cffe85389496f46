//! Key derivation and the process-wide [`KeyStore`].
//!
//! # Lifecycle
//!
//! 1. At startup the configured secret is handed to [`KeyStore::new`]. Nothing
//!    is derived yet and an absent secret is not an error at this point.
//! 2. The first call to [`KeyStore::key`] derives the [`KeyMaterial`] exactly
//!    once. Concurrent first callers block on the same initialisation and all
//!    observe the same fully-built key.
//! 3. The key lives until the last `KeyStore` clone is dropped, at which point
//!    its bytes are zeroed.
//!
//! # Security invariants
//!
//! - Key material is **never** logged, serialised, or included in traces.
//! - The raw secret is never used as a key directly; it always goes through
//!   HKDF-SHA-256.

use std::sync::Arc;

use hkdf::Hkdf;
use once_cell::sync::OnceCell;
use sha2::Sha256;
use thiserror::Error;
use tracing::info;
use zeroize::{Zeroize, Zeroizing};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Shortest secret accepted for key derivation.
pub const MIN_SECRET_LEN: usize = 32;

const KDF_SALT: &[u8] = b"payload-seal-kdf-salt-v1";
const KDF_INFO: &[u8] = b"payload-seal-envelope-key-v1";

/// Configuration errors raised while producing key material.
///
/// All variants are fatal for the process; none are worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// No secret was configured, or it was empty.
    #[error("payload secret is not configured")]
    Missing,

    /// The secret is below [`MIN_SECRET_LEN`].
    #[error("payload secret is too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    /// HKDF refused the requested output length.
    #[error("key derivation failed")]
    Derivation,
}

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// When this type is dropped the memory is overwritten with zeroes.
pub struct KeyMaterial(Box<[u8; KEY_LEN]>);

impl KeyMaterial {
    /// Wrap raw key bytes, for callers that already hold a uniform key.
    pub fn from_bytes(mut bytes: [u8; KEY_LEN]) -> Self {
        let key = Self(Box::new(bytes));
        bytes.zeroize();
        key
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, even in debug builds.
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Derive the envelope key from a configured secret with HKDF-SHA-256.
///
/// # Errors
///
/// Returns [`KeyError::Missing`] for an empty secret and
/// [`KeyError::TooShort`] for one below [`MIN_SECRET_LEN`] bytes.
pub fn derive_key(secret: &[u8]) -> Result<KeyMaterial, KeyError> {
    if secret.is_empty() {
        return Err(KeyError::Missing);
    }
    if secret.len() < MIN_SECRET_LEN {
        return Err(KeyError::TooShort {
            len: secret.len(),
            min: MIN_SECRET_LEN,
        });
    }

    let hkdf = Hkdf::<Sha256>::new(Some(KDF_SALT), secret);
    let mut okm = Box::new([0u8; KEY_LEN]);
    hkdf.expand(KDF_INFO, &mut okm[..])
        .map_err(|_| KeyError::Derivation)?;
    Ok(KeyMaterial(okm))
}

struct Inner {
    secret: Option<Zeroizing<Vec<u8>>>,
    key: OnceCell<KeyMaterial>,
}

/// Lazily-initialised holder of the single active key.
///
/// Cheap to clone; every clone shares the same once-only initialisation, so a
/// key is derived at most once per process no matter how many request
/// handlers race on first use.
#[derive(Clone)]
pub struct KeyStore {
    inner: Arc<Inner>,
}

impl KeyStore {
    /// Create a store for `secret`. Derivation is deferred to the first
    /// [`KeyStore::key`] call.
    pub fn new(secret: Option<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                secret: secret.map(Zeroizing::new),
                key: OnceCell::new(),
            }),
        }
    }

    /// Create a store already holding `key`.
    pub fn from_key(key: KeyMaterial) -> Self {
        Self {
            inner: Arc::new(Inner {
                secret: None,
                key: OnceCell::with_value(key),
            }),
        }
    }

    /// Returns `true` if a non-empty secret was supplied or a key injected.
    pub fn is_configured(&self) -> bool {
        self.is_ready() || self.inner.secret.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Returns `true` once the key has been derived.
    pub fn is_ready(&self) -> bool {
        self.inner.key.get().is_some()
    }

    /// Borrow the key, deriving it on first use.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] if the secret is absent or too weak. The store
    /// stays uninitialised in that case and every later call fails the same way.
    pub fn key(&self) -> Result<&KeyMaterial, KeyError> {
        self.inner.key.get_or_try_init(|| {
            let secret = self.inner.secret.as_ref().ok_or(KeyError::Missing)?;
            let key = derive_key(secret)?;
            info!("payload key derived");
            Ok(key)
        })
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("configured", &self.is_configured())
            .field("ready", &self.is_ready())
            .finish()
    }
}
