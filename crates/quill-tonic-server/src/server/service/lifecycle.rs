//! Stream admission and graceful shutdown.
//!
//! [`Lifecycle`] is shared by every handler. Each streaming call registers
//! itself through [`Lifecycle::begin_stream`] and holds the returned
//! [`StreamGuard`] for as long as it runs. Shutdown is coordinated in phases:
//! stop admitting new streams, let in-flight streams drain for a bounded time,
//! then cancel whatever is left through the shared [`CancellationToken`].

use crate::server::telemetry::{
    decrement_streams_inflight, increment_requests, increment_streams_inflight,
    record_stream_duration,
};
use core::time::Duration;
use quill_tonic_core::{Error, Result};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Instant,
};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct Lifecycle {
    shutdown_token: CancellationToken,
    accepting: AtomicBool,
    streams_inflight: AtomicUsize,
    shutdown_timeout: Duration,
}

impl Lifecycle {
    pub fn new(shutdown_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            shutdown_token: CancellationToken::new(),
            accepting: AtomicBool::new(true),
            streams_inflight: AtomicUsize::new(0),
            shutdown_timeout,
        })
    }

    /// A token cancelled when shutdown gives up on draining.
    ///
    /// Child tokens let a single call be cancelled without affecting others.
    pub fn call_token(&self) -> CancellationToken {
        self.shutdown_token.child_token()
    }

    pub fn streams_inflight(&self) -> usize {
        self.streams_inflight.load(Ordering::Acquire)
    }

    /// Registers a new streaming call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] once shutdown has started.
    pub fn begin_stream(self: &Arc<Self>) -> Result<StreamGuard> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(Error::Cancelled);
        }

        self.streams_inflight.fetch_add(1, Ordering::AcqRel);
        increment_requests();
        increment_streams_inflight();

        Ok(StreamGuard {
            lifecycle: Arc::clone(self),
            start: Instant::now(),
        })
    }

    /// Gracefully shuts down streaming.
    ///
    /// - Refuses new streams.
    /// - Waits up to the configured timeout for in-flight streams to finish.
    /// - Cancels the shared token so the remaining streams stop at their next
    ///   suspension point.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new streams ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new streams");
        self.accepting.store(false, Ordering::Release);

        // === Phase 1: Wait for in-flight streams to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Draining in-flight streams ({} active)",
            self.streams_inflight()
        );
        let drain_result = timeout(self.shutdown_timeout, async {
            while self.streams_inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight streams drained successfully");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Graceful drain timed out ({} streams still active)",
                    self.streams_inflight()
                );
            }
        }

        // === Phase 2: Cancel any remaining streams ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling remaining streams via shutdown token");
        self.shutdown_token.cancel();
    }
}

/// Registration of one in-flight streaming call. Dropping it ends the
/// registration and records the call's duration.
#[derive(Debug)]
pub struct StreamGuard {
    lifecycle: Arc<Lifecycle>,
    start: Instant,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.lifecycle
            .streams_inflight
            .fetch_sub(1, Ordering::AcqRel);
        decrement_streams_inflight();
        record_stream_duration(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}
