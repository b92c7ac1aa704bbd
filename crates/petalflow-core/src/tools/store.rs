//! Tool store contract
//!
//! The service persists registrations through this trait; in-memory, file,
//! and SQLite backends all implement the same four operations. Stores must
//! serialize concurrent mutation and give readers a consistent snapshot.
//! Cancellation is by future drop: an abandoned call must not leave a
//! half-written record.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::tools::ToolRegistration;

/// Abstract CRUD contract over persisted registrations
#[async_trait]
pub trait ToolStore: Send + Sync {
    /// All registrations, ordered by name
    async fn list(&self) -> Result<Vec<ToolRegistration>>;

    /// One registration, or None
    async fn get(&self, name: &str) -> Result<Option<ToolRegistration>>;

    /// Insert or replace by name
    async fn upsert(&self, registration: ToolRegistration) -> Result<()>;

    /// Remove by name; false if absent
    async fn delete(&self, name: &str) -> Result<bool>;
}

/// In-process store backed by a map
///
/// The default backend, and the test double for the service. Writes go
/// through one `RwLock` so mutation is serialized; `list` clones under the
/// read lock, giving callers a consistent snapshot.
#[derive(Default)]
pub struct MemoryToolStore {
    records: RwLock<BTreeMap<String, ToolRegistration>>,
}

impl MemoryToolStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolStore for MemoryToolStore {
    async fn list(&self) -> Result<Vec<ToolRegistration>> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }

    async fn get(&self, name: &str) -> Result<Option<ToolRegistration>> {
        let records = self.records.read().await;
        Ok(records.get(name).cloned())
    }

    async fn upsert(&self, registration: ToolRegistration) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(registration.name.clone(), registration);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::manifest::testutil::minimal_manifest;
    use crate::tools::{ToolOrigin, ToolStatus};

    fn registration(name: &str) -> ToolRegistration {
        ToolRegistration::new(name, ToolOrigin::Native, minimal_manifest(name))
    }

    #[tokio::test]
    async fn test_upsert_then_get_roundtrip() {
        let store = MemoryToolStore::new();
        store.upsert(registration("echo")).await.unwrap();

        let fetched = store.get("echo").await.unwrap().unwrap();
        assert_eq!(fetched.name, "echo");
        assert_eq!(fetched.status, ToolStatus::Unverified);
    }

    #[tokio::test]
    async fn test_list_ordered_by_name() {
        let store = MemoryToolStore::new();
        store.upsert(registration("zeta")).await.unwrap();
        store.upsert(registration("alpha")).await.unwrap();

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = MemoryToolStore::new();
        store.upsert(registration("echo")).await.unwrap();

        let mut updated = registration("echo");
        updated.enabled = false;
        store.upsert(updated).await.unwrap();

        let fetched = store.get("echo").await.unwrap().unwrap();
        assert!(!fetched.enabled);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryToolStore::new();
        store.upsert(registration("echo")).await.unwrap();

        assert!(store.delete("echo").await.unwrap());
        assert!(!store.delete("echo").await.unwrap());
        assert!(store.get("echo").await.unwrap().is_none());
    }
}
