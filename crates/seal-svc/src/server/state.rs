//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use seal::{Dispatcher, KeyStore, KeyedCodec};

/// Application state shared across all request handlers.
///
/// Cloning is a reference-count bump; the key store inside the dispatcher is
/// shared, so the key is derived once for the whole process.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Create a new [`AppState`] around the given key store and optional
    /// associated-data context.
    pub fn new(keys: KeyStore, associated_data: Option<Vec<u8>>) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(KeyedCodec::new(keys, associated_data))),
        }
    }

    /// Key store backing the dispatcher.
    pub fn keys(&self) -> &KeyStore {
        self.dispatcher.sealer().keys()
    }
}

impl Default for AppState {
    /// Creates an [`AppState`] with no secret configured, suitable for tests.
    fn default() -> Self {
        Self::new(KeyStore::new(None), None)
    }
}
