//! gRPC service implementation for the calculator.
//!
//! Each method exercises one call shape: `Sum` is unary, `Primes` is
//! server-streaming, `Avg` is client-streaming and `Max` is bidirectional.
//! Streaming calls register with the shared [`Lifecycle`] for their whole
//! duration.

use super::{ResponseStream, lifecycle::Lifecycle};
use crate::server::{
    config::ServerConfig,
    streaming::{
        consumer::{aggregate_average, reply_running_max},
        producer::feed_factors,
        spawn_feeder,
    },
    telemetry::increment_stream_errors,
};
use quill_tonic_core::{
    Error,
    proto::{
        AvgRequest, AvgResponse, MaxRequest, MaxResponse, PrimeRequest, PrimeResponse,
        SumRequest, SumResponse, calculator_service_server::CalculatorService,
    },
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

#[derive(Clone)]
pub struct CalculatorHandler {
    config: ServerConfig,
    lifecycle: Arc<Lifecycle>,
}

impl CalculatorHandler {
    pub fn new(config: ServerConfig, lifecycle: Arc<Lifecycle>) -> Self {
        Self { config, lifecycle }
    }
}

#[tonic::async_trait]
impl CalculatorService for CalculatorHandler {
    type PrimesStream = ResponseStream<PrimeResponse>;
    type MaxStream = ResponseStream<MaxResponse>;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn sum(&self, req: Request<SumRequest>) -> Result<Response<SumResponse>, Status> {
        let SumRequest {
            first_number,
            second_number,
        } = req.into_inner();

        let result = first_number
            .checked_add(second_number)
            .ok_or_else(|| Error::invalid_argument("Sum overflows a 64-bit integer"))?;

        Ok(Response::new(SumResponse { result }))
    }

    /// Streams the prime factors of `number`, smallest first, with
    /// multiplicity.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn primes(
        &self,
        req: Request<PrimeRequest>,
    ) -> Result<Response<Self::PrimesStream>, Status> {
        let number = u64::try_from(req.into_inner().number)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| Error::invalid_argument("The number must be positive"))?;

        let guard = self.lifecycle.begin_stream()?;
        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);
        let token = self.lifecycle.call_token();
        spawn_feeder(resp_tx, guard, move |tx| feed_factors(number, tx, token));

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }

    /// Replies once, after the caller half-closes, with the average of every
    /// number it sent.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn avg(
        &self,
        req: Request<Streaming<AvgRequest>>,
    ) -> Result<Response<AvgResponse>, Status> {
        let _guard = self.lifecycle.begin_stream()?;
        let token = self.lifecycle.call_token();

        let result = aggregate_average(req.into_inner(), token)
            .await
            .inspect_err(|_| increment_stream_errors())?;

        Ok(Response::new(AvgResponse { result }))
    }

    /// Replies to each number with the largest number received so far.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn max(
        &self,
        req: Request<Streaming<MaxRequest>>,
    ) -> Result<Response<Self::MaxStream>, Status> {
        let guard = self.lifecycle.begin_stream()?;
        let inbound = req.into_inner();
        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);
        let token = self.lifecycle.call_token();
        spawn_feeder(resp_tx, guard, move |tx| {
            reply_running_max(inbound, tx, token)
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}
