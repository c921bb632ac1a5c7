//! Shared types and error definitions used by the quill server and its
//! clients.
//!
//! ## Submodules
//!
//! - [`error`] - Canonical error kinds and their mapping onto gRPC statuses.
//! - [`types`] - Record identity and domain record types.
//! - [`proto`] - Generated protobuf messages, clients and service traits.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from `proto/quill.proto`.
///
/// ## Services
///
/// - `BlogService` - CRUD over the record store plus a streaming listing.
/// - `CalculatorService` - one method per call shape (unary, server
///   streaming, client streaming, bidirectional).
/// - `GreetingService` - a single unary greeting.
pub mod proto {
    tonic::include_proto!("quill");

    /// Encoded descriptor set registered with the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("quill_descriptor");
}
