//! In-process document store.
//!
//! Backs the CLI (loaded from and saved to a JSON snapshot) and the tests.
//! Clones share the same underlying data.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use subasa_core::DocumentId;

use super::{Document, DocumentStore, StoreError};

#[derive(Debug, Clone)]
struct Stored {
    data: Value,
    version: u64,
}

type Collections = HashMap<String, BTreeMap<DocumentId, Stored>>;

/// Document store held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot of the form
    /// `{ "<collection>": { "<id>": { ...document... } } }`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the snapshot is not shaped as above.
    pub fn from_snapshot(snapshot: Value) -> Result<Self, StoreError> {
        let Value::Object(collections) = snapshot else {
            return Err(StoreError::Unavailable(
                "snapshot root must be an object".to_string(),
            ));
        };

        let mut data = Collections::new();
        for (name, docs) in collections {
            let Value::Object(docs) = docs else {
                return Err(StoreError::Unavailable(format!(
                    "collection {name} must be an object keyed by document id"
                )));
            };
            let entries = docs
                .into_iter()
                .map(|(id, data)| (DocumentId::new(id), Stored { data, version: 1 }))
                .collect();
            data.insert(name, entries);
        }

        Ok(Self {
            inner: Arc::new(RwLock::new(data)),
        })
    }

    /// Current contents as a snapshot value. Versions are not included.
    pub async fn snapshot(&self) -> Value {
        let guard = self.inner.read().await;
        let collections: Map<String, Value> = guard
            .iter()
            .map(|(name, docs)| {
                let docs: Map<String, Value> = docs
                    .iter()
                    .map(|(id, stored)| (id.to_string(), stored.data.clone()))
                    .collect();
                (name.clone(), Value::Object(docs))
            })
            .collect();
        Value::Object(collections)
    }

    /// Load a snapshot file. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        match tokio::fs::read(path.as_ref()).await {
            Ok(bytes) => Self::from_snapshot(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot on disk, starting empty");
                Ok(Self::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the current contents to a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&self.snapshot().await)?;
        if let Some(parent) = path.as_ref().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path.as_ref(), bytes).await?;
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|stored| Document {
                id: id.clone(),
                data: stored.data.clone(),
                version: stored.version,
            }))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, stored)| Document {
                        id: id.clone(),
                        data: stored.data.clone(),
                        version: stored.version,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, collection: &str, data: Value) -> Result<DocumentId, StoreError> {
        let id = DocumentId::new(Uuid::new_v4().simple().to_string());
        let mut guard = self.inner.write().await;
        guard
            .entry(collection.to_owned())
            .or_default()
            .insert(id.clone(), Stored { data, version: 1 });
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &DocumentId, data: Value) -> Result<u64, StoreError> {
        let mut guard = self.inner.write().await;
        let docs = guard.entry(collection.to_owned()).or_default();
        let version = docs.get(id).map_or(1, |stored| stored.version + 1);
        docs.insert(id.clone(), Stored { data, version });
        Ok(version)
    }

    async fn update_if_version(
        &self,
        collection: &str,
        id: &DocumentId,
        data: Value,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut guard = self.inner.write().await;
        let stored = guard
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;

        if stored.version != expected_version {
            return Err(StoreError::VersionMismatch {
                path: format!("{collection}/{id}"),
                expected: expected_version,
                actual: stored.version,
            });
        }

        stored.data = data;
        stored.version += 1;
        Ok(stored.version)
    }
}
