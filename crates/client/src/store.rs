//! Persistent bid secrets.
//!
//! A secret `{bid_value, salt}` is written once at commit, read at reveal,
//! and erased after a reveal lands or when the auction is finalized. It
//! cannot be recovered from the ledger, so losing it loses the deposit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use zkbid_types::{Address, BidSecret};

use crate::error::StoreError;

/// Keyed store of bid secrets, `(auction_id, bidder) -> secret`.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Store a secret. Fails with [`StoreError::AlreadyExists`] if one is present.
    async fn put_if_absent(
        &self,
        auction_id: u64,
        bidder: &Address,
        secret: BidSecret,
    ) -> Result<(), StoreError>;

    async fn get(&self, auction_id: u64, bidder: &Address) -> Result<Option<BidSecret>, StoreError>;

    async fn remove(
        &self,
        auction_id: u64,
        bidder: &Address,
    ) -> Result<Option<BidSecret>, StoreError>;

    /// Erase every secret for an auction. Returns how many were removed.
    async fn remove_auction(&self, auction_id: u64) -> Result<usize, StoreError>;
}

/// In-process store.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<(u64, Address), BidSecret>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.secrets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.lock().is_empty()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn put_if_absent(
        &self,
        auction_id: u64,
        bidder: &Address,
        secret: BidSecret,
    ) -> Result<(), StoreError> {
        let mut secrets = self.secrets.lock();
        if secrets.contains_key(&(auction_id, *bidder)) {
            return Err(StoreError::AlreadyExists { auction_id });
        }
        secrets.insert((auction_id, *bidder), secret);
        Ok(())
    }

    async fn get(&self, auction_id: u64, bidder: &Address) -> Result<Option<BidSecret>, StoreError> {
        Ok(self.secrets.lock().get(&(auction_id, *bidder)).cloned())
    }

    async fn remove(
        &self,
        auction_id: u64,
        bidder: &Address,
    ) -> Result<Option<BidSecret>, StoreError> {
        Ok(self.secrets.lock().remove(&(auction_id, *bidder)))
    }

    async fn remove_auction(&self, auction_id: u64) -> Result<usize, StoreError> {
        let mut secrets = self.secrets.lock();
        let before = secrets.len();
        secrets.retain(|(id, _), _| *id != auction_id);
        Ok(before - secrets.len())
    }
}

/// JSON file store. Every mutation rewrites the file through a temporary
/// sibling and a rename.
pub struct FileSecretStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

type SecretFile = HashMap<String, BidSecret>;

fn file_key(auction_id: u64, bidder: &Address) -> String {
    format!("{auction_id}:{}", hex::encode(bidder))
}

fn key_auction(key: &str) -> Option<u64> {
    key.split_once(':').and_then(|(id, _)| id.parse().ok())
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<SecretFile, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SecretFile::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, secrets: &SecretFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes =
            serde_json::to_vec_pretty(secrets).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn put_if_absent(
        &self,
        auction_id: u64,
        bidder: &Address,
        secret: BidSecret,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut secrets = self.load().await?;
        let key = file_key(auction_id, bidder);
        if secrets.contains_key(&key) {
            return Err(StoreError::AlreadyExists { auction_id });
        }
        secrets.insert(key, secret);
        self.save(&secrets).await
    }

    async fn get(&self, auction_id: u64, bidder: &Address) -> Result<Option<BidSecret>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(&file_key(auction_id, bidder)))
    }

    async fn remove(
        &self,
        auction_id: u64,
        bidder: &Address,
    ) -> Result<Option<BidSecret>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut secrets = self.load().await?;
        let removed = secrets.remove(&file_key(auction_id, bidder));
        if removed.is_some() {
            self.save(&secrets).await?;
        }
        Ok(removed)
    }

    async fn remove_auction(&self, auction_id: u64) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let mut secrets = self.load().await?;
        let before = secrets.len();
        secrets.retain(|key, _| key_auction(key) != Some(auction_id));
        let removed = before - secrets.len();
        if removed > 0 {
            self.save(&secrets).await?;
        }
        Ok(removed)
    }
}
