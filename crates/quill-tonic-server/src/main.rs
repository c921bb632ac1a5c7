#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use futures::Stream;
use quill_tonic_core::proto::{
    FILE_DESCRIPTOR_SET, blog_service_server::BlogServiceServer,
    calculator_service_server::CalculatorServiceServer,
    greeting_service_server::GreetingServiceServer,
};
use server::Services;
use server::config::{CliArgs, ServerConfig};
use server::service::{
    blog::BlogHandler, calculator::CalculatorHandler, greeting::GreetingHandler,
    lifecycle::Lifecycle,
};
use server::store::{local::LocalCollection, records::RecordStore};
use server::telemetry::{TelemetryProviders, init_telemetry};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::transport::server::Connected;
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;
    let store = open_store(&config).await?;

    if config.uds {
        #[cfg(unix)]
        {
            use tokio::net::UnixListener;
            use tokio_stream::wrappers::UnixListenerStream;
            let uds_path = config.server_addr.clone();
            let uds = UnixListener::bind(&uds_path)?;
            let incoming = UnixListenerStream::new(uds);
            log_startup_info(&uds_path, &config);
            let res = run_server_with_incoming(providers, incoming, store, config).await;
            // A panic can still leave the socket file behind.
            let _ = std::fs::remove_file(&uds_path);
            res
        }
        #[cfg(not(unix))]
        {
            anyhow::bail!("Unix domain sockets are not supported on this platform");
        }
    } else {
        let tcp_path = config.server_addr.clone();
        let tcp = TcpListener::bind(&tcp_path).await?;
        let incoming = TcpListenerStream::new(tcp);
        log_startup_info(&tcp_path, &config);
        run_server_with_incoming(providers, incoming, store, config).await
    }
}

async fn open_store(config: &ServerConfig) -> anyhow::Result<RecordStore> {
    let collection = match &config.data_file {
        Some(path) => LocalCollection::open(path).await?,
        None => LocalCollection::in_memory(),
    };

    #[cfg(feature = "tracing")]
    tracing::info!(
        "Blog collection ready ({} documents, {})",
        collection.len().await,
        config
            .data_file
            .as_deref()
            .map_or_else(|| "in memory".to_string(), |p| p.display().to_string())
    );

    Ok(RecordStore::new(Arc::new(collection)))
}

async fn run_server_with_incoming<I, IO, IE>(
    providers: TelemetryProviders,
    incoming: I,
    store: RecordStore,
    config: ServerConfig,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    set_health(&health_reporter, true).await;

    let services = Services::new(&config, store);

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(services.blog)
        .add_service(services.calculator)
        .add_service(services.greeting)
        .serve_with_incoming_shutdown(
            incoming,
            shutdown_signal(services.lifecycle, health_reporter, providers),
        )
        .await?;

    #[cfg(feature = "tracing")]
    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(_addr: &str, _config: &ServerConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting quill services on {} with full config: {:#?}",
            _addr,
            _config
        );
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting quill services on {} (stream buffer {})",
            _addr,
            _config.stream_buffer_size
        );
    }
}

async fn set_health(reporter: &HealthReporter, serving: bool) {
    if serving {
        reporter.set_serving::<BlogServiceServer<BlogHandler>>().await;
        reporter
            .set_serving::<CalculatorServiceServer<CalculatorHandler>>()
            .await;
        reporter
            .set_serving::<GreetingServiceServer<GreetingHandler>>()
            .await;
    } else {
        reporter
            .set_not_serving::<BlogServiceServer<BlogHandler>>()
            .await;
        reporter
            .set_not_serving::<CalculatorServiceServer<CalculatorHandler>>()
            .await;
        reporter
            .set_not_serving::<GreetingServiceServer<GreetingHandler>>()
            .await;
    }
}

async fn shutdown_signal(
    lifecycle: Arc<Lifecycle>,
    health_reporter: HealthReporter,
    providers: TelemetryProviders,
) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to install SIGTERM handler: {}", _e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(_e) = signal::ctrl_c().await {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to install Ctrl+C handler: {}", _e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Shutdown signal received, terminating gracefully...");

    // 1. Publish the status
    set_health(&health_reporter, false).await;

    // 2. Drain, then cancel, streaming calls
    lifecycle.shutdown().await;

    // 3. Flush telemetry
    providers.shutdown();
}
