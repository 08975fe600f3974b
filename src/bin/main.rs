//! lb-dns binary entry point.

use clap::Parser;
use lb_dns::{telemetry, Config, DnsServer, Resolver};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// DNS load balancer over dynamically bound address pools.
#[derive(Parser, Debug)]
#[command(name = "lb-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "lb-dns.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()).required(false))
        .add_source(
            config::Environment::with_prefix("LB_DNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    config.validate()?;

    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        listen_addr = %config.dns.listen_addr,
        default_node_class = ?config.bindings.default_node_class,
        default_ingress_class = ?config.bindings.default_ingress_class,
        "Starting lb-dns"
    );

    // Setup graceful shutdown
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    });

    let resolver = Resolver::new();
    let server = DnsServer::new(config.dns, config.bindings, resolver);
    let result = server.run(shutdown).await;

    telemetry::shutdown();

    if let Err(e) = result {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("lb-dns shutdown complete");
    Ok(())
}
