//! Where marshaled sessions wait between the redirect and the callback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::AuthError;

/// Key/value store holding one marshaled session per key.
///
/// `save` overwrites, so a key never carries more than one pending attempt.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, AuthError>;

    async fn save(&self, key: &str, value: String) -> Result<(), AuthError>;

    /// Removes and returns the value in one step.
    async fn take(&self, key: &str) -> Result<Option<String>, AuthError>;

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.take(key).await.map(|_| ())
    }
}

/// How long an in-memory entry survives unless configured otherwise. Matches
/// the default session cookie max-age.
const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    saved_at: Instant,
}

/// In-process store. Data is lost when the last clone is dropped.
///
/// Entries older than the TTL read as missing and are purged on the next
/// `save`, so attempts that never reach the callback do not pile up.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn is_live(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.saved_at) < self.ttl
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, AuthError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.value.clone()))
    }

    async fn save(&self, key: &str, value: String) -> Result<(), AuthError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| self.is_live(entry, now));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(purged, "dropped expired sessions");
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                saved_at: now,
            },
        );
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, AuthError> {
        let now = Instant::now();
        let entry = self.entries.write().await.remove(key);
        Ok(entry
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.value))
    }
}
