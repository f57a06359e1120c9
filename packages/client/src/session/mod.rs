//! Client session: token pair storage and the refresh single-flight gate.

mod refresh;
mod storage;
mod token;

pub use refresh::{AuthSession, REFRESH_PATH, RefreshOutcome, RefreshState};
pub use storage::{FileTokenStorage, MemoryTokenStorage, SESSION_STORAGE_KEY, TokenStorage};
pub use token::{TokenPair, TokenStore};
