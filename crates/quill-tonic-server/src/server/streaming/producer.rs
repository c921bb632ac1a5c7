use super::factors::{FactorStatus, PrimeFactors};
use crate::server::store::records::RecordStream;
use futures::StreamExt;
use quill_tonic_core::{
    Error, Result,
    proto::{Blog, PrimeResponse},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Trial divisions performed between cancellation checks.
const TRIAL_BUDGET: u32 = 1 << 16;

/// Sends one message to the caller, suspending until the channel has room.
///
/// Returns [`Error::Cancelled`] if the call is cancelled while waiting, or if
/// the caller has dropped its end of the stream.
pub async fn send_item<T>(
    resp_tx: &mpsc::Sender<Result<T, Status>>,
    item: T,
    token: &CancellationToken,
) -> Result<()> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Error::Cancelled),
        sent = resp_tx.send(Ok(item)) => sent.map_err(|_| Error::Cancelled),
    }
}

/// Best effort delivery of a terminal error to the caller.
///
/// The caller may already have disconnected, in which case the error is only
/// logged.
pub async fn forward_error<T>(resp_tx: &mpsc::Sender<Result<T, Status>>, err: &Error) {
    if let Err(_e) = resp_tx.send(Err(err.clone().into())).await {
        #[cfg(feature = "tracing")]
        tracing::debug!("Failed to forward err: {}", err);
    }
}

/// Streams the prime factors of `number` to the caller in non-decreasing
/// order and returns how many were sent.
///
/// The search runs in slices of [`TRIAL_BUDGET`] divisions. Between slices the
/// task yields to the scheduler and stops early if the call was cancelled or
/// the caller went away.
pub async fn feed_factors(
    number: u64,
    resp_tx: mpsc::Sender<Result<PrimeResponse, Status>>,
    token: CancellationToken,
) -> Result<usize> {
    let mut factors = PrimeFactors::new(number);
    let mut sent = 0;

    loop {
        match factors.poll_next(TRIAL_BUDGET) {
            FactorStatus::Ready { factor } => {
                let prime_factor = i64::try_from(factor).map_err(Error::internal)?;
                send_item(&resp_tx, PrimeResponse { prime_factor }, &token).await?;
                sent += 1;
            }
            FactorStatus::Pending => {
                if token.is_cancelled() || resp_tx.is_closed() {
                    return Err(Error::Cancelled);
                }
                // Yield to the scheduler to avoid hogging the worker thread.
                tokio::task::yield_now().await;
            }
            FactorStatus::Done => return Ok(sent),
        }
    }
}

/// Forwards every record from the store to the caller and returns how many
/// were sent.
///
/// A store failure mid-way ends the stream with that error. Records already
/// sent stay delivered.
pub async fn feed_records(
    mut records: RecordStream,
    resp_tx: mpsc::Sender<Result<Blog, Status>>,
    token: CancellationToken,
) -> Result<usize> {
    let mut sent = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::Cancelled),
            next = records.next() => next,
        };

        match next {
            Some(Ok(record)) => {
                send_item(&resp_tx, Blog::from(record), &token).await?;
                sent += 1;
            }
            Some(Err(e)) => return Err(e),
            None => return Ok(sent),
        }
    }
}
