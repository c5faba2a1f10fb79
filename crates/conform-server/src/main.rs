use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use conform_controller::{ControllerSetup, Manager, add_to_manager};
use conform_metrics::{
    MetricsRegistry, MetricsSys, RegistryBackend, ServeConfig,
    backend::{DEFAULT_TLS_CERT_PATH, DEFAULT_TLS_KEY_PATH, METRICS_PORT},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Controllers are wired in here as they land; each receives the
/// manager and a handle to the metrics reporter.
const CONTROLLERS: &[ControllerSetup] = &[];

#[derive(Parser)]
#[command(name = "conformd", about = "Compliance control-plane server")]
struct Cli {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = METRICS_PORT)]
    port: u16,

    #[arg(long, default_value = DEFAULT_TLS_CERT_PATH)]
    metrics_cert: String,

    #[arg(long, default_value = DEFAULT_TLS_KEY_PATH)]
    metrics_key: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("conform_metrics=info".parse()?)
        .add_directive("conform_controller=info".parse()?)
        .add_directive("conform_server=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let listen: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;

    let registry = Arc::new(MetricsRegistry::new());
    let backend = Arc::new(RegistryBackend::new(registry));
    let metrics = Arc::new(MetricsSys::new(
        backend,
        ServeConfig::new(listen, cli.metrics_cert, cli.metrics_key),
    ));

    let mut manager = Manager::new();
    add_to_manager(&mut manager, metrics, CONTROLLERS)?;

    let shutdown = manager.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    info!("conform control plane started");
    manager.run().await?;

    Ok(())
}
