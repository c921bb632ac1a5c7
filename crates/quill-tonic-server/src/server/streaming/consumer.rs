use super::{
    accumulator::{Average, RunningMax},
    producer::send_item,
};
use futures::{Stream, StreamExt};
use quill_tonic_core::{
    Error, Result,
    proto::{AvgRequest, MaxRequest, MaxResponse},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Consumes a client stream of numbers and returns their average once the
/// caller half-closes.
///
/// No response is produced per message. Every message received before
/// end-of-input is included. A cancelled call or a transport error ends the
/// aggregation and the partial accumulator is dropped with it.
pub async fn aggregate_average<S>(mut inbound: S, token: CancellationToken) -> Result<f64>
where
    S: Stream<Item = Result<AvgRequest, Status>> + Unpin,
{
    let mut average = Average::default();

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::Cancelled),
            next = inbound.next() => next,
        };

        match next {
            Some(Ok(req)) => average.push(req.number),
            Some(Err(status)) => return Err(status.into()),
            None => break,
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(count = average.count(), "average input complete");

    average.finish()
}

/// Replies to every inbound number with the maximum seen so far and returns
/// how many replies were sent.
///
/// Each reply is sent before the next message is read, so at most the
/// outbound channel's capacity is ever buffered. The call ends normally when
/// the caller half-closes; if the caller stops reading replies, the loop
/// exits without error.
pub async fn reply_running_max<S>(
    mut inbound: S,
    resp_tx: mpsc::Sender<Result<MaxResponse, Status>>,
    token: CancellationToken,
) -> Result<usize>
where
    S: Stream<Item = Result<MaxRequest, Status>> + Unpin,
{
    let mut running = RunningMax::default();
    let mut sent = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::Cancelled),
            () = resp_tx.closed() => return Ok(sent),
            next = inbound.next() => next,
        };

        match next {
            Some(Ok(req)) => {
                let max = running.push(req.number);
                match send_item(&resp_tx, MaxResponse { max }, &token).await {
                    Ok(()) => sent += 1,
                    // The caller stopped listening.
                    Err(Error::Cancelled) if resp_tx.is_closed() => return Ok(sent),
                    Err(e) => return Err(e),
                }
            }
            Some(Err(status)) => return Err(status.into()),
            None => return Ok(sent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avg_requests(numbers: &[i64]) -> impl Stream<Item = Result<AvgRequest, Status>> + Unpin {
        futures::stream::iter(
            numbers
                .iter()
                .map(|&number| Ok(AvgRequest { number }))
                .collect::<Vec<_>>(),
        )
    }

    fn max_requests(numbers: &[i64]) -> impl Stream<Item = Result<MaxRequest, Status>> + Unpin {
        futures::stream::iter(
            numbers
                .iter()
                .map(|&number| Ok(MaxRequest { number }))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn average_of_streamed_numbers() {
        let numbers: Vec<i64> = (1..=10).collect();
        let avg = aggregate_average(avg_requests(&numbers), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(avg, 5.5);
    }

    #[tokio::test]
    async fn average_of_empty_stream_is_invalid_argument() {
        let err = aggregate_average(avg_requests(&[]), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn average_reports_cancellation_from_the_peer() {
        let inbound = futures::stream::iter(vec![
            Ok(AvgRequest { number: 1 }),
            Err(Status::cancelled("client went away")),
        ]);
        let err = aggregate_average(inbound, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, Error::Cancelled);
    }

    #[tokio::test]
    async fn average_stops_on_server_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let err = aggregate_average(futures::stream::pending(), token)
            .await
            .unwrap_err();
        assert_eq!(err, Error::Cancelled);
    }

    #[tokio::test]
    async fn running_max_replies_once_per_input() {
        const INPUTS: &[i64] = &[1, 2, 100, 4, 5, 30, 7, 8, 9, 10];
        // Capacity 1 forces each reply to be consumed before the next input
        // is read.
        let (tx, mut rx) = mpsc::channel(1);
        let task = tokio::spawn(reply_running_max(
            max_requests(INPUTS),
            tx,
            CancellationToken::new(),
        ));

        let mut outputs = Vec::new();
        while let Some(reply) = rx.recv().await {
            outputs.push(reply.unwrap().max);
        }

        assert_eq!(outputs, [1, 2, 100, 100, 100, 100, 100, 100, 100, 100]);
        assert_eq!(task.await.unwrap().unwrap(), INPUTS.len());
    }

    #[tokio::test]
    async fn running_max_ends_quietly_when_caller_stops_reading() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sent = reply_running_max(max_requests(&[3, 1, 4]), tx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sent, 0);
    }
}
