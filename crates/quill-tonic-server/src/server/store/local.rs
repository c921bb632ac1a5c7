//! In-process document collection with optional JSON snapshot persistence.
//!
//! Documents are kept in a [`BTreeMap`] keyed by [`DocumentId`]. Identities
//! are time-ordered ULIDs, so map order is creation order. When opened with a
//! path, every mutation is applied to a copy of the state, written to a
//! temporary file, atomically renamed over the snapshot, and only then made
//! visible. A failed write leaves both the file and the in-memory state
//! unchanged.
//!
//! The snapshot also records the last issued identity so that identities of
//! deleted documents are never handed out again, across restarts included.

use super::{BackendError, DeleteAck, DocumentCollection, DocumentStream, InsertAck};
use futures::StreamExt;
use quill_tonic_core::types::{
    DocumentId, RecordFields, format_document_id, next_document_id, parse_document_id,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};
use tokio::sync::RwLock;

#[derive(Clone, Debug, Default)]
struct State {
    documents: BTreeMap<DocumentId, RecordFields>,
    last_issued: Option<DocumentId>,
}

/// On-disk layout of the collection.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    last_issued: Option<String>,
    #[serde(default)]
    documents: BTreeMap<String, RecordFields>,
}

impl From<&State> for Snapshot {
    fn from(state: &State) -> Self {
        Self {
            last_issued: state.last_issued.as_ref().map(format_document_id),
            documents: state
                .documents
                .iter()
                .map(|(id, doc)| (format_document_id(id), doc.clone()))
                .collect(),
        }
    }
}

impl TryFrom<Snapshot> for State {
    type Error = BackendError;

    fn try_from(snapshot: Snapshot) -> Result<Self, Self::Error> {
        let corrupt = |raw: &str| BackendError::Corrupt {
            reason: format!("invalid document id {raw:?}"),
        };

        let mut documents = BTreeMap::new();
        for (raw, doc) in snapshot.documents {
            let id = parse_document_id(&raw).map_err(|_| corrupt(&raw))?;
            documents.insert(id, doc);
        }

        let recorded = snapshot
            .last_issued
            .as_deref()
            .map(|raw| parse_document_id(raw).map_err(|_| corrupt(raw)))
            .transpose()?;
        // A hand-edited file may hold documents newer than the watermark.
        let last_issued = recorded.max(documents.keys().next_back().copied());

        Ok(Self {
            documents,
            last_issued,
        })
    }
}

/// The bundled [`DocumentCollection`] backend.
#[derive(Debug)]
pub struct LocalCollection {
    state: RwLock<State>,
    path: Option<PathBuf>,
}

impl LocalCollection {
    /// Creates an empty collection that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(State::default()),
            path: None,
        }
    }

    /// Opens the collection persisted at `path`, starting empty if the file
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or decoded.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => State::try_from(serde_json::from_slice::<Snapshot>(&bytes)?)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => State::default(),
            Err(e) => return Err(e.into()),
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Loaded {} documents from {}",
            state.documents.len(),
            path.display()
        );

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    /// Applies `f` to the state, persisting the result first when the
    /// collection is file-backed. `f` must leave the state untouched when it
    /// fails.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut State) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut state = self.state.write().await;
        match &self.path {
            None => f(&mut state),
            Some(path) => {
                let mut next = state.clone();
                let out = f(&mut next)?;
                persist(path, &next).await?;
                *state = next;
                Ok(out)
            }
        }
    }
}

async fn persist(path: &Path, state: &State) -> Result<(), BackendError> {
    let bytes = serde_json::to_vec_pretty(&Snapshot::from(state))?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[tonic::async_trait]
impl DocumentCollection for LocalCollection {
    async fn insert_one(&self, document: RecordFields) -> Result<InsertAck, BackendError> {
        let id = self
            .mutate(|state| {
                let id = next_document_id(state.last_issued)
                    .ok_or(BackendError::IdentitiesExhausted)?;
                state.documents.insert(id, document);
                state.last_issued = Some(id);
                Ok(id)
            })
            .await?;

        Ok(InsertAck {
            acknowledged: true,
            inserted_id: Some(id),
        })
    }

    async fn find_one(&self, id: DocumentId) -> Result<Option<RecordFields>, BackendError> {
        Ok(self.state.read().await.documents.get(&id).cloned())
    }

    async fn find_one_and_replace(
        &self,
        id: DocumentId,
        document: RecordFields,
    ) -> Result<Option<RecordFields>, BackendError> {
        if !self.state.read().await.documents.contains_key(&id) {
            return Ok(None);
        }

        self.mutate(|state| {
            Ok(state
                .documents
                .get_mut(&id)
                .map(|slot| core::mem::replace(slot, document)))
        })
        .await
    }

    async fn delete_one(&self, id: DocumentId) -> Result<DeleteAck, BackendError> {
        if !self.state.read().await.documents.contains_key(&id) {
            return Ok(DeleteAck {
                acknowledged: true,
                deleted_count: 0,
            });
        }

        let removed = self
            .mutate(|state| Ok(state.documents.remove(&id).is_some()))
            .await?;

        Ok(DeleteAck {
            acknowledged: true,
            deleted_count: u64::from(removed),
        })
    }

    async fn find_all(&self) -> Result<DocumentStream, BackendError> {
        let documents: Vec<_> = self
            .state
            .read()
            .await
            .documents
            .iter()
            .map(|(id, doc)| (*id, doc.clone()))
            .collect();

        Ok(futures::stream::iter(documents.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn fields(title: &str) -> RecordFields {
        RecordFields {
            author: "Thopv".to_string(),
            title: title.to_string(),
            content: "Hello world".to_string(),
        }
    }

    fn scratch_file() -> PathBuf {
        let name = format!("quill-{}.json", format_document_id(&next_document_id(None).unwrap()));
        std::env::temp_dir().join(name)
    }

    #[tokio::test]
    async fn insert_then_find() {
        let collection = LocalCollection::in_memory();
        let ack = collection.insert_one(fields("a")).await.unwrap();
        assert!(ack.acknowledged);

        let id = ack.inserted_id.unwrap();
        assert_eq!(collection.find_one(id).await.unwrap(), Some(fields("a")));
    }

    #[tokio::test]
    async fn replace_returns_previous_and_ignores_unknown_ids() {
        let collection = LocalCollection::in_memory();
        let id = collection.insert_one(fields("a")).await.unwrap().inserted_id.unwrap();

        let previous = collection.find_one_and_replace(id, fields("b")).await.unwrap();
        assert_eq!(previous, Some(fields("a")));
        assert_eq!(collection.find_one(id).await.unwrap(), Some(fields("b")));

        let unknown = next_document_id(Some(id)).unwrap();
        assert_eq!(
            collection.find_one_and_replace(unknown, fields("c")).await.unwrap(),
            None
        );
        assert_eq!(collection.len().await, 1);
    }

    #[tokio::test]
    async fn delete_reports_count() {
        let collection = LocalCollection::in_memory();
        let id = collection.insert_one(fields("a")).await.unwrap().inserted_id.unwrap();

        assert_eq!(collection.delete_one(id).await.unwrap().deleted_count, 1);
        assert_eq!(collection.delete_one(id).await.unwrap().deleted_count, 0);
        assert_eq!(collection.find_one(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn find_all_is_in_creation_order() {
        let collection = LocalCollection::in_memory();
        let mut ids = Vec::new();
        for title in ["a", "b", "c", "d"] {
            ids.push(collection.insert_one(fields(title)).await.unwrap().inserted_id.unwrap());
        }

        let listed: Vec<_> = collection.find_all().await.unwrap().try_collect().await.unwrap();
        let listed_ids: Vec<_> = listed.iter().map(|(id, _)| *id).collect();
        assert_eq!(listed_ids, ids);
        assert_eq!(listed[2].1.title, "c");
    }

    #[tokio::test]
    async fn find_all_on_empty_collection_is_empty() {
        let collection = LocalCollection::in_memory();
        let listed: Vec<_> = collection.find_all().await.unwrap().try_collect().await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let path = scratch_file();
        let kept = {
            let collection = LocalCollection::open(&path).await.unwrap();
            let kept = collection.insert_one(fields("kept")).await.unwrap().inserted_id.unwrap();
            let gone = collection.insert_one(fields("gone")).await.unwrap().inserted_id.unwrap();
            collection.delete_one(gone).await.unwrap();
            kept
        };

        let reopened = LocalCollection::open(&path).await.unwrap();
        assert_eq!(reopened.len().await, 1);
        assert_eq!(reopened.find_one(kept).await.unwrap(), Some(fields("kept")));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn deleted_ids_are_not_reissued_after_reopen() {
        let path = scratch_file();
        let gone = {
            let collection = LocalCollection::open(&path).await.unwrap();
            let gone = collection.insert_one(fields("gone")).await.unwrap().inserted_id.unwrap();
            collection.delete_one(gone).await.unwrap();
            gone
        };

        let reopened = LocalCollection::open(&path).await.unwrap();
        let fresh = reopened.insert_one(fields("new")).await.unwrap().inserted_id.unwrap();
        assert!(fresh > gone);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_rejected() {
        let path = scratch_file();
        std::fs::write(&path, r#"{"documents":{"nope":{"author":"","title":"","content":""}}}"#)
            .unwrap();

        let err = LocalCollection::open(&path).await.unwrap_err();
        assert!(matches!(err, BackendError::Corrupt { .. }));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn exhausted_watermark_refuses_inserts() {
        let path = scratch_file();
        let snapshot = r#"{"last_issued":"7ZZZZZZZZZZZZZZZZZZZZZZZZZ","documents":{}}"#;
        std::fs::write(&path, snapshot).unwrap();

        let collection = LocalCollection::open(&path).await.unwrap();
        let err = collection.insert_one(fields("late")).await.unwrap_err();
        assert!(matches!(err, BackendError::IdentitiesExhausted));
        assert_eq!(collection.len().await, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), snapshot);

        let _ = std::fs::remove_file(&path);
    }
}
