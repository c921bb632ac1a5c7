//! gRPC service implementations.
//!
//! ## Structure
//!
//! - [`blog`] - `BlogService`: CRUD plus a streaming listing over the record
//!   store.
//! - [`calculator`] - `CalculatorService`: one method per call shape.
//! - [`greeting`] - `GreetingService`: a single unary greeting.
//! - [`lifecycle`] - stream admission and graceful shutdown shared by all
//!   handlers.
//!
//! Handlers never build a `tonic::Status` by hand. Every failure is a
//! [`quill_tonic_core::Error`] converted at the boundary.

pub mod blog;
pub mod calculator;
pub mod greeting;
pub mod lifecycle;

use core::pin::Pin;
use tokio_stream::Stream;
use tonic::Status;

/// Boxed outbound stream type used by every server-streaming method.
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;
