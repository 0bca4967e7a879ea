//! Append-only artifact versions and identifier resolution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::artifact::ArtifactVersion;
use crate::error::{Result, SiteError};

/// Persistence collaborator for artifact versions.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Write one version row and return its id. Rows are never updated.
    async fn insert(&self, conversation_id: &str, version_number: i32, code: &str) -> Result<Uuid>;

    /// Highest-numbered version for a conversation.
    async fn latest(&self, conversation_id: &str) -> Result<Option<ArtifactVersion>>;

    async fn by_id(&self, id: Uuid) -> Result<Option<ArtifactVersion>>;
}

/// In-process store for the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    rows: RwLock<Vec<ArtifactVersion>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn insert(&self, conversation_id: &str, version_number: i32, code: &str) -> Result<Uuid> {
        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|r| r.conversation_id == conversation_id && r.version_number == version_number)
        {
            return Err(SiteError::persistence(format!(
                "version {} already exists for conversation {}",
                version_number, conversation_id
            )));
        }

        let id = Uuid::new_v4();
        rows.push(ArtifactVersion {
            id,
            conversation_id: conversation_id.to_string(),
            version_number,
            code: code.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn latest(&self, conversation_id: &str) -> Result<Option<ArtifactVersion>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|r| r.conversation_id == conversation_id)
            .max_by_key(|r| r.version_number)
            .cloned())
    }

    async fn by_id(&self, id: Uuid) -> Result<Option<ArtifactVersion>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|r| r.id == id).cloned())
    }
}

type LockMap = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

fn lock_map(locks: &LockMap) -> StdMutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    // the map holds no invariant a panicking holder could break
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds one conversation's write lock entry. The entry is dropped from the
/// map once no other append holds or waits on it, so the map only tracks
/// conversations with appends in flight.
struct LockLease<'a> {
    locks: &'a LockMap,
    conversation_id: String,
    lock: Arc<Mutex<()>>,
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut locks = lock_map(self.locks);
        // one reference in the map, one here
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.conversation_id);
        }
    }
}

/// Assigns version numbers. The read-max, +1, insert sequence runs under a
/// per-conversation lock so concurrent appends never share a number.
#[derive(Clone)]
pub struct VersionLedger {
    store: Arc<dyn VersionStore>,
    locks: Arc<LockMap>,
}

impl VersionLedger {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self {
            store,
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> Arc<dyn VersionStore> {
        Arc::clone(&self.store)
    }

    fn lease(&self, conversation_id: &str) -> LockLease<'_> {
        let lock = Arc::clone(
            lock_map(&self.locks)
                .entry(conversation_id.to_string())
                .or_default(),
        );
        LockLease {
            locks: self.locks.as_ref(),
            conversation_id: conversation_id.to_string(),
            lock,
        }
    }

    #[cfg(test)]
    fn tracked_conversations(&self) -> usize {
        lock_map(&self.locks).len()
    }

    /// Append `code` as the next version of a conversation.
    pub async fn append(&self, conversation_id: &str, code: &str) -> Result<ArtifactVersion> {
        let lease = self.lease(conversation_id);
        let _guard = lease.lock.lock().await;

        let next = match self.store.latest(conversation_id).await? {
            Some(v) => v.version_number + 1,
            None => 1,
        };
        let id = self.store.insert(conversation_id, next, code).await?;
        debug!(conversation_id = %conversation_id, version = next, "version appended");

        self.store
            .by_id(id)
            .await?
            .ok_or_else(|| SiteError::persistence(format!("inserted version {} not readable", id)))
    }
}

/// Exact version id first, then latest by conversation.
#[derive(Clone)]
pub struct VersionResolver {
    store: Arc<dyn VersionStore>,
}

impl VersionResolver {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, identifier: &str) -> Result<ArtifactVersion> {
        let identifier = identifier.trim();

        if let Ok(id) = Uuid::parse_str(identifier) {
            if let Some(version) = self.store.by_id(id).await? {
                return Ok(version);
            }
        }

        self.store
            .latest(identifier)
            .await?
            .ok_or_else(|| SiteError::not_found(identifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> (Arc<MemoryVersionStore>, VersionLedger) {
        let store = Arc::new(MemoryVersionStore::new());
        let ledger = VersionLedger::new(store.clone());
        (store, ledger)
    }

    #[tokio::test]
    async fn sequential_appends_are_n_and_n_plus_one() {
        let (_, ledger) = ledger();
        let a = ledger.append("conv", "<p>1</p>").await.unwrap();
        let b = ledger.append("conv", "<p>2</p>").await.unwrap();
        assert_eq!(a.version_number, 1);
        assert_eq!(b.version_number, a.version_number + 1);
    }

    #[tokio::test]
    async fn conversations_number_independently() {
        let (_, ledger) = ledger();
        ledger.append("a", "x").await.unwrap();
        ledger.append("a", "x").await.unwrap();
        let first_b = ledger.append("b", "x").await.unwrap();
        assert_eq!(first_b.version_number, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_never_share_a_number() {
        let (store, ledger) = ledger();
        let mut handles = Vec::new();
        for i in 0..32 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.append("busy", &format!("v{}", i)).await.unwrap().version_number
            }));
        }

        let mut numbers = Vec::new();
        for h in handles {
            numbers.push(h.await.unwrap());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=32).collect::<Vec<_>>());
        assert_eq!(store.len().await, 32);
        assert_eq!(ledger.tracked_conversations(), 0);
    }

    #[tokio::test]
    async fn lock_entries_are_released_after_append() {
        let (store, ledger) = ledger();
        for i in 0..1000 {
            ledger.append(&format!("conv-{}", i), "x").await.unwrap();
        }
        assert_eq!(store.len().await, 1000);
        assert_eq!(ledger.tracked_conversations(), 0);
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl VersionStore for ReadOnlyStore {
        async fn insert(&self, _: &str, _: i32, _: &str) -> Result<Uuid> {
            Err(SiteError::persistence("read only"))
        }
        async fn latest(&self, _: &str) -> Result<Option<ArtifactVersion>> {
            Ok(None)
        }
        async fn by_id(&self, _: Uuid) -> Result<Option<ArtifactVersion>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn failed_append_releases_its_lock_entry() {
        let ledger = VersionLedger::new(Arc::new(ReadOnlyStore));
        let err = ledger.append("conv", "x").await.unwrap_err();
        assert!(matches!(err, SiteError::Persistence { .. }));
        assert_eq!(ledger.tracked_conversations(), 0);
    }

    #[tokio::test]
    async fn store_rejects_duplicate_numbers() {
        let store = MemoryVersionStore::new();
        store.insert("c", 1, "x").await.unwrap();
        let err = store.insert("c", 1, "y").await.unwrap_err();
        assert!(matches!(err, SiteError::Persistence { .. }));
    }

    #[tokio::test]
    async fn exact_id_wins_over_newer_version() {
        let (store, ledger) = ledger();
        let v1 = ledger.append("conv", "one").await.unwrap();
        ledger.append("conv", "two").await.unwrap();

        let resolver = VersionResolver::new(store);
        let found = resolver.resolve(&v1.id.to_string()).await.unwrap();
        assert_eq!(found.version_number, 1);
        assert_eq!(found.code, "one");
    }

    #[tokio::test]
    async fn conversation_id_resolves_to_latest() {
        let (store, ledger) = ledger();
        ledger.append("conv", "one").await.unwrap();
        ledger.append("conv", "two").await.unwrap();

        let resolver = VersionResolver::new(store);
        let found = resolver.resolve("conv").await.unwrap();
        assert_eq!(found.version_number, 2);
        assert_eq!(found.code, "two");
    }

    #[tokio::test]
    async fn uuid_shaped_conversation_id_falls_back() {
        let (store, ledger) = ledger();
        let conv = Uuid::new_v4().to_string();
        ledger.append(&conv, "only").await.unwrap();

        let found = VersionResolver::new(store).resolve(&conv).await.unwrap();
        assert_eq!(found.code, "only");
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found() {
        let (store, _) = ledger();
        let err = VersionResolver::new(store).resolve("nope").await.unwrap_err();
        assert!(matches!(err, SiteError::NotFound { .. }));
    }
}
