//! Token store: the one piece of state shared by every request pipeline and
//! chat session of a running client.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::storage::{MemoryTokenStorage, SESSION_STORAGE_KEY, TokenStorage};

/// Access/refresh token pair as issued by `POST /login` and `POST /token`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Holds the current token pair, writes it through to storage and publishes
/// every change to subscribers.
///
/// Reads are synchronous and side-effect free. Writes happen only through
/// [`TokenStore::set_tokens`] (login, refresh, logout).
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
    key: String,
    current: watch::Sender<Option<TokenPair>>,
    /// Set while the in-memory pair has not reached storage
    unsaved: AtomicBool,
}

impl TokenStore {
    /// Create a store backed by `storage`, restoring any persisted pair.
    ///
    /// An unreadable entry is logged and treated as "no session".
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self::with_key(storage, SESSION_STORAGE_KEY)
    }

    /// Same as [`TokenStore::new`] with a custom storage key
    pub fn with_key(storage: Arc<dyn TokenStorage>, key: impl Into<String>) -> Self {
        let key = key.into();
        let restored = match storage.load(&key) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("Failed to restore session '{}': {}", key, e);
                None
            }
        };
        if restored.is_some() {
            tracing::debug!("Restored session from storage key '{}'", key);
        }

        Self {
            storage,
            key,
            current: watch::Sender::new(restored),
            unsaved: AtomicBool::new(false),
        }
    }

    /// Store that keeps its tokens in memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStorage::new()))
    }

    pub fn access_token(&self) -> Option<String> {
        self.current
            .borrow()
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.current
            .borrow()
            .as_ref()
            .map(|tokens| tokens.refresh_token.clone())
            .filter(|token| !token.is_empty())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token().is_some()
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        self.current.borrow().clone()
    }

    /// Overwrite (`Some`) or clear (`None`) the token pair.
    ///
    /// The in-memory value is authoritative: a storage failure is logged and
    /// does not prevent subscribers from seeing the change.
    pub fn set_tokens(&self, tokens: Option<TokenPair>) {
        self.persist(tokens.as_ref());
        let cleared = tokens.is_none();
        self.current.send_replace(tokens);

        if cleared {
            tracing::info!("Session cleared");
        } else {
            tracing::debug!("Session tokens updated");
        }
    }

    /// Re-read the storage entry and publish it if another writer changed it.
    ///
    /// While the current pair is unsaved the stored entry is stale: the write
    /// is retried instead and memory is left untouched.
    ///
    /// Returns `true` when the in-memory pair was replaced.
    pub fn reload(&self) -> bool {
        if self.has_unsaved_changes() {
            let current = self.tokens();
            self.persist(current.as_ref());
            return false;
        }

        let stored = match self.storage.load(&self.key) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("Failed to reload session '{}': {}", self.key, e);
                return false;
            }
        };
        self.current.send_if_modified(|current| {
            if *current == stored {
                false
            } else {
                *current = stored;
                true
            }
        })
    }

    /// Whether the last write to storage failed
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved.load(Ordering::SeqCst)
    }

    fn persist(&self, tokens: Option<&TokenPair>) {
        match self.storage.store(&self.key, tokens) {
            Ok(()) => self.unsaved.store(false, Ordering::SeqCst),
            Err(e) => {
                tracing::warn!("Failed to persist session '{}': {}", self.key, e);
                self.unsaved.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Observe every login, refresh and logout from any context
    pub fn subscribe(&self) -> watch::Receiver<Option<TokenPair>> {
        self.current.subscribe()
    }
}
