//! Server internals for `quill-tonic-server`.
//!
//! - [`config`] - CLI and environment configuration.
//! - [`store`] - document collection backends and the record store adapter.
//! - [`streaming`] - per-call streaming machinery.
//! - [`service`] - the gRPC handlers.
//! - [`telemetry`] - logging, tracing and metrics setup.

pub mod config;
pub mod service;
pub mod store;
pub mod streaming;
pub mod telemetry;


use config::ServerConfig;
use quill_tonic_core::proto::{
    blog_service_server::BlogServiceServer, calculator_service_server::CalculatorServiceServer,
    greeting_service_server::GreetingServiceServer,
};
use service::{
    blog::BlogHandler, calculator::CalculatorHandler, greeting::GreetingHandler,
    lifecycle::Lifecycle,
};
use std::sync::Arc;
use store::records::RecordStore;
use tonic::codec::CompressionEncoding;

macro_rules! with_compression {
    ($server:expr) => {
        $server
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Deflate)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Deflate)
    };
}

/// The three gRPC services sharing one [`Lifecycle`].
pub struct Services {
    pub blog: BlogServiceServer<BlogHandler>,
    pub calculator: CalculatorServiceServer<CalculatorHandler>,
    pub greeting: GreetingServiceServer<GreetingHandler>,
    pub lifecycle: Arc<Lifecycle>,
}

impl Services {
    pub fn new(config: &ServerConfig, store: RecordStore) -> Self {
        let lifecycle = Lifecycle::new(config.shutdown_timeout);

        let blog = BlogHandler::new(store, config.clone(), Arc::clone(&lifecycle));
        let calculator = CalculatorHandler::new(config.clone(), Arc::clone(&lifecycle));

        Self {
            blog: with_compression!(BlogServiceServer::new(blog)),
            calculator: with_compression!(CalculatorServiceServer::new(calculator)),
            greeting: with_compression!(GreetingServiceServer::new(GreetingHandler)),
            lifecycle,
        }
    }
}
