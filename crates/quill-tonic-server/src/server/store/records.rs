//! Record store adapter.
//!
//! [`RecordStore`] maps the blog operations onto a [`DocumentCollection`] and
//! is the only place where backend outcomes are classified:
//!
//! | outcome                                   | error                |
//! |-------------------------------------------|----------------------|
//! | empty or malformed identity               | `InvalidArgument`    |
//! | backend raised an error                   | `StoreUnavailable`   |
//! | insert acknowledged without an identity   | `NotPersisted`       |
//! | write not acknowledged                    | `StoreUnavailable`   |
//! | no document with the identity             | `NotFound`           |
//!
//! Identities are validated before the backend is touched, so invalid input
//! never reaches it.

use super::{BackendError, DocumentCollection};
use futures::{StreamExt, stream::BoxStream};
use quill_tonic_core::{
    Error, Result,
    types::{DocumentId, Record, RecordFields, parse_document_id},
};
use std::sync::Arc;

/// Lazy sequence of records; a backend failure mid-way is yielded as an
/// error item and ends the sequence.
pub type RecordStream = BoxStream<'static, Result<Record>>;

#[derive(Clone)]
pub struct RecordStore {
    collection: Arc<dyn DocumentCollection>,
}

impl RecordStore {
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        Self { collection }
    }

    /// Persists a new record and returns its identity.
    pub async fn create(&self, fields: RecordFields) -> Result<DocumentId> {
        let ack = self.collection.insert_one(fields).await?;

        match ack.inserted_id {
            Some(id) if ack.acknowledged => {
                #[cfg(feature = "tracing")]
                tracing::debug!(id = %quill_tonic_core::types::format_document_id(&id), "record created");
                Ok(id)
            }
            _ => Err(Error::NotPersisted),
        }
    }

    /// Fetches the record with the given wire identity.
    pub async fn read(&self, raw_id: &str) -> Result<Record> {
        let id = parse_document_id(raw_id)?;

        match self.collection.find_one(id).await? {
            Some(fields) => Ok(Record { id, fields }),
            None => Err(not_found(raw_id)),
        }
    }

    /// Replaces author, title and content of an existing record.
    pub async fn update(&self, raw_id: &str, fields: RecordFields) -> Result<()> {
        let id = parse_document_id(raw_id)?;

        match self.collection.find_one_and_replace(id, fields).await? {
            Some(_previous) => Ok(()),
            None => Err(not_found(raw_id)),
        }
    }

    /// Removes a record. Deleting an identity that does not exist is
    /// `NotFound`.
    pub async fn delete(&self, raw_id: &str) -> Result<()> {
        let id = parse_document_id(raw_id)?;
        let ack = self.collection.delete_one(id).await?;

        if !ack.acknowledged {
            return Err(Error::store_unavailable(format!(
                "delete of {raw_id} was not acknowledged"
            )));
        }

        if ack.deleted_count == 0 {
            return Err(not_found(raw_id));
        }

        Ok(())
    }

    /// Streams every record in store order.
    pub async fn list_all(&self) -> Result<RecordStream> {
        let documents = self.collection.find_all().await?;

        let records = documents
            .map(|item| {
                item.map(|(id, fields)| Record { id, fields })
                    .map_err(|e: BackendError| Error::from(e))
            })
            .scan(false, |failed, item| {
                // Stop after the first error so a broken cursor ends the
                // stream instead of yielding further items.
                if *failed {
                    return futures::future::ready(None);
                }
                *failed = item.is_err();
                futures::future::ready(Some(item))
            });

        Ok(records.boxed())
    }
}

fn not_found(raw_id: &str) -> Error {
    Error::NotFound {
        id: raw_id.to_string(),
    }
}
