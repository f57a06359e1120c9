//! Durable storage backends for the session token pair.
//!
//! ## 責務
//!
//! - `TokenStorage` trait: key 単位でトークンペアを読み書きする
//! - `FileTokenStorage`: `<dir>/<key>.json` に保存する実装
//! - `MemoryTokenStorage`: テストや一時セッション用のインメモリ実装

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use crate::error::StorageError;

use super::TokenPair;

/// Key under which the session token pair is persisted
pub const SESSION_STORAGE_KEY: &str = "castline.session";

/// Persistence seam of the token store
pub trait TokenStorage: Send + Sync {
    /// Read the pair stored under `key`
    fn load(&self, key: &str) -> Result<Option<TokenPair>, StorageError>;

    /// Overwrite (`Some`) or remove (`None`) the pair stored under `key`
    fn store(&self, key: &str, tokens: Option<&TokenPair>) -> Result<(), StorageError>;
}

/// Stores each key as a JSON file inside a directory
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    dir: PathBuf,
}

impl FileTokenStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self, key: &str) -> Result<Option<TokenPair>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, key: &str, tokens: Option<&TokenPair>) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match tokens {
            Some(tokens) => {
                fs::create_dir_all(&self.dir)?;
                fs::write(&path, serde_json::to_vec_pretty(tokens)?)?;
            }
            None => match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        tracing::debug!("Session storage '{}' updated", path.display());
        Ok(())
    }
}

/// In-memory storage, shared between stores that hold the same instance
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    entries: Mutex<HashMap<String, TokenPair>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self, key: &str) -> Result<Option<TokenPair>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn store(&self, key: &str, tokens: Option<&TokenPair>) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match tokens {
            Some(tokens) => {
                entries.insert(key.to_string(), tokens.clone());
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair::new(access, refresh)
    }

    #[test]
    fn test_file_storage_round_trip() {
        // テスト項目: ファイルに保存したトークンペアを読み戻せる
        // given (前提条件):
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("nested"));

        // when (操作):
        storage
            .store(SESSION_STORAGE_KEY, Some(&pair("A1", "R1")))
            .unwrap();
        let loaded = storage.load(SESSION_STORAGE_KEY).unwrap();

        // then (期待する結果):
        assert_eq!(loaded, Some(pair("A1", "R1")));
        assert!(dir.path().join("nested/castline.session.json").exists());
    }

    #[test]
    fn test_file_storage_clear_removes_file() {
        // テスト項目: None を保存するとファイルが削除され、二重削除もエラーにならない
        // given (前提条件):
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path());
        storage
            .store(SESSION_STORAGE_KEY, Some(&pair("A1", "R1")))
            .unwrap();

        // when (操作):
        storage.store(SESSION_STORAGE_KEY, None).unwrap();
        let second_clear = storage.store(SESSION_STORAGE_KEY, None);

        // then (期待する結果):
        assert!(second_clear.is_ok());
        assert_eq!(storage.load(SESSION_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_storage_rejects_corrupted_content() {
        // テスト項目: 壊れた JSON は Serde エラーになる
        // given (前提条件):
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("castline.session.json"), "not json").unwrap();
        let storage = FileTokenStorage::new(dir.path());

        // when (操作):
        let result = storage.load(SESSION_STORAGE_KEY);

        // then (期待する結果):
        assert!(matches!(result, Err(StorageError::Serde(_))));
    }

    #[test]
    fn test_memory_storage_keys_are_independent() {
        // テスト項目: 異なる key の値は互いに影響しない
        // given (前提条件):
        let storage = MemoryTokenStorage::new();
        storage.store("a", Some(&pair("A", "RA"))).unwrap();
        storage.store("b", Some(&pair("B", "RB"))).unwrap();

        // when (操作):
        storage.store("a", None).unwrap();

        // then (期待する結果):
        assert_eq!(storage.load("a").unwrap(), None);
        assert_eq!(storage.load("b").unwrap(), Some(pair("B", "RB")));
    }
}
