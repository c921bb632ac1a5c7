//! Document storage for the blog service.
//!
//! The store is split in two layers:
//!
//! - [`DocumentCollection`] is the backend contract: a flat collection of
//!   documents keyed by a store-assigned [`DocumentId`], with
//!   acknowledgement-style results for writes. [`local::LocalCollection`] is
//!   the bundled backend.
//! - [`records::RecordStore`] is the adapter the handlers talk to. It owns the
//!   conversion between wire identities and [`DocumentId`], validates input
//!   before any backend access, and classifies every backend outcome into a
//!   [`quill_tonic_core::Error`].

pub mod local;
pub mod records;

use futures::stream::BoxStream;
use quill_tonic_core::{Error, types::DocumentId, types::RecordFields};

/// Failure raised by a [`DocumentCollection`] backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Every identity up to the largest ULID has been issued.
    #[error("identity space exhausted")]
    IdentitiesExhausted,

    /// The backing file decoded but its contents are inconsistent.
    #[error("corrupt collection: {reason}")]
    Corrupt { reason: String },
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Error::store_unavailable(err)
    }
}

/// Outcome of [`DocumentCollection::insert_one`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertAck {
    pub acknowledged: bool,
    pub inserted_id: Option<DocumentId>,
}

/// Outcome of [`DocumentCollection::delete_one`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeleteAck {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// Lazy sequence of `(identity, document)` pairs in store order.
pub type DocumentStream = BoxStream<'static, Result<(DocumentId, RecordFields), BackendError>>;

/// A collection of documents with store-assigned identities.
///
/// Every single-document operation is atomic from the caller's point of view.
/// There are no multi-document transactions.
#[tonic::async_trait]
pub trait DocumentCollection: Send + Sync + 'static {
    /// Stores a new document and assigns it an identity.
    async fn insert_one(&self, document: RecordFields) -> Result<InsertAck, BackendError>;

    /// Returns the document with the given identity, if any.
    async fn find_one(&self, id: DocumentId) -> Result<Option<RecordFields>, BackendError>;

    /// Replaces the document with the given identity and returns the previous
    /// version, or `None` if nothing matched.
    async fn find_one_and_replace(
        &self,
        id: DocumentId,
        document: RecordFields,
    ) -> Result<Option<RecordFields>, BackendError>;

    /// Removes the document with the given identity.
    async fn delete_one(&self, id: DocumentId) -> Result<DeleteAck, BackendError>;

    /// Streams every document in store order.
    async fn find_all(&self) -> Result<DocumentStream, BackendError>;
}
