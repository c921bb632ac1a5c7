//! Streaming call machinery.
//!
//! - [`factors`] - resumable prime factorisation.
//! - [`accumulator`] - call-scoped running average and running maximum.
//! - [`producer`] - server-streaming feeders writing into a bounded channel.
//! - [`consumer`] - client-streaming and bidirectional loops over inbound
//!   messages.
//!
//! Outbound streams are always an `mpsc` channel of the configured capacity
//! wrapped in a `ReceiverStream`. The feeding task owns the only sender, so
//! the caller's stream completes exactly when the task finishes.

pub mod accumulator;
pub mod consumer;
pub mod factors;
pub mod producer;

use crate::server::{
    service::lifecycle::StreamGuard,
    telemetry::{increment_messages_streamed, increment_stream_errors},
};
use core::future::Future;
use quill_tonic_core::{Error, Result};
use tokio::sync::mpsc;
use tonic::Status;

/// Runs a feeding task for one outbound stream.
///
/// `feed` receives the sender and must return the number of messages it
/// delivered. On failure the error is forwarded to the caller as the stream's
/// terminal status, unless the failure is the caller itself going away. The
/// [`StreamGuard`] is held until the task ends.
pub fn spawn_feeder<T, F, Fut>(resp_tx: mpsc::Sender<Result<T, Status>>, guard: StreamGuard, feed: F)
where
    T: Send + 'static,
    F: FnOnce(mpsc::Sender<Result<T, Status>>) -> Fut,
    Fut: Future<Output = Result<usize>> + Send + 'static,
{
    let task = feed(resp_tx.clone());

    let fut = async move {
        match task.await {
            Ok(sent) => increment_messages_streamed(sent as u64),
            Err(Error::Cancelled) if resp_tx.is_closed() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Caller went away mid-stream");
            }
            Err(e) => {
                increment_stream_errors();
                #[cfg(feature = "tracing")]
                tracing::warn!("Error: {}", e);
                producer::forward_error(&resp_tx, &e).await;
            }
        }
        drop(guard);
    };

    #[cfg(feature = "tracing")]
    let fut = {
        use tracing::Instrument;
        let span = tracing::info_span!("streaming");
        fut.instrument(span)
    };

    tokio::spawn(fut);
}
