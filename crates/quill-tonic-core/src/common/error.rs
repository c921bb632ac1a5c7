//! Error types for the quill services.
//!
//! This module defines the central `Error` enum: the canonical set of failure
//! kinds a handler may surface. Every failure path is classified into exactly
//! one of these before it crosses the call boundary, and `From<Error>` for
//! `tonic::Status` is the single place where kinds become wire codes.
//!
//! ## Error Cases
//! - `InvalidArgument`: a required field is missing or malformed (e.g. an
//!   empty record id). Detected before any store access.
//! - `NotFound`: the referenced record does not exist.
//! - `StoreUnavailable`: the backing store failed or did not acknowledge an
//!   operation.
//! - `NotPersisted`: the store accepted a write but returned no identity.
//! - `Internal`: any other server-side failure (e.g. a closed channel).
//! - `Cancelled`: the caller or the server abandoned the call.

use tonic::{Code, Status};

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for the quill services.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The request was malformed or violated a domain constraint.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// No record exists with the given identity.
    #[error("Record was not found (id: {id})")]
    NotFound { id: String },

    /// The backend failed while serving the operation.
    #[error("Store unavailable: {context}")]
    StoreUnavailable { context: String },

    /// The backend accepted a write without assigning an identity.
    #[error("Record couldn't be persisted")]
    NotPersisted,

    /// Internal failure unrelated to the store.
    #[error("Internal error: {context}")]
    Internal { context: String },

    /// The call was abandoned before it completed.
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn store_unavailable(context: impl ToString) -> Self {
        Self::StoreUnavailable {
            context: context.to_string(),
        }
    }

    pub fn internal(context: impl ToString) -> Self {
        Self::Internal {
            context: context.to_string(),
        }
    }

    /// The gRPC code this kind is surfaced as.
    pub const fn code(&self) -> Code {
        match self {
            Self::InvalidArgument { .. } => Code::InvalidArgument,
            Self::NotFound { .. } => Code::NotFound,
            Self::StoreUnavailable { .. } | Self::NotPersisted | Self::Internal { .. } => {
                Code::Internal
            }
            Self::Cancelled => Code::Cancelled,
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        let code = err.code();
        let message = match err {
            Error::InvalidArgument { reason } => reason,
            other => other.to_string(),
        };
        Status::new(code, message)
    }
}

/// Classifies a status received from the peer (e.g. while reading an inbound
/// stream). Only cancellation is meaningful to the handlers; everything else
/// is treated as an internal transport failure.
impl From<Status> for Error {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::Cancelled => Self::Cancelled,
            _ => Self::internal(format!("transport error: {}", status.message())),
        }
    }
}
