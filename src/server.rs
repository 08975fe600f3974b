//! DNS server setup and lifecycle management.

use hickory_server::authority::{AuthorityObject, Catalog};
use hickory_server::ServerFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::authority::BalancerAuthority;
use crate::binding::{self, Binder};
use crate::config::{BindingsConfig, DnsConfig};
use crate::error::BalancerError;
use crate::feed;
use crate::resolver::Resolver;

/// Interval for emitting routing table metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically emit routing table metrics.
async fn metrics_loop(resolver: Resolver, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                resolver.emit_metrics();
                debug!(
                    pools = resolver.pools_count(),
                    exact_hosts = resolver.exact_hosts_count(),
                    wildcard_hosts = resolver.wildcard_hosts_count(),
                    addresses = resolver.addresses_count(),
                    "emitted routing table metrics"
                );
            }
            _ = shutdown.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// Build a catalog that sends every query to the balancer.
pub fn build_catalog(resolver: Resolver) -> Catalog {
    let authority: Arc<dyn AuthorityObject> = Arc::new(BalancerAuthority::new(resolver));

    let mut catalog = Catalog::new();
    catalog.upsert(authority.origin().clone(), vec![authority]);
    catalog
}

/// Load-balancing DNS server.
pub struct DnsServer {
    dns: DnsConfig,
    bindings: BindingsConfig,
    resolver: Resolver,
}

impl DnsServer {
    /// Create a server answering from `resolver`.
    pub fn new(dns: DnsConfig, bindings: BindingsConfig, resolver: Resolver) -> Self {
        Self {
            dns,
            bindings,
            resolver,
        }
    }

    /// Get a handle to the routing table.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Run the DNS server until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), BalancerError> {
        info!(
            listen_addr = %self.dns.listen_addr,
            feed_addr = ?self.bindings.feed_addr,
            "Starting lb-dns server"
        );

        binding::apply_static(&self.resolver, &self.bindings);

        // Bind every socket before spawning anything, so a failed bind
        // leaves no task behind.
        let udp_socket = UdpSocket::bind(self.dns.listen_addr).await?;
        let tcp_listener = TcpListener::bind(self.dns.listen_addr).await?;
        let feed_listener = match self.bindings.feed_addr {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };

        // Start binding feed
        let feed_handle = feed_listener.map(|listener| {
            info!(addr = ?listener.local_addr().ok(), "Binding feed listening");
            let binder = Binder::new(self.resolver.clone(), &self.bindings).shared();
            tokio::spawn(feed::serve(listener, binder, shutdown.clone()))
        });

        let mut server = ServerFuture::new(build_catalog(self.resolver.clone()));

        info!(addr = %self.dns.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        info!(addr = %self.dns.listen_addr, "DNS TCP listening");
        server.register_listener(
            tcp_listener,
            Duration::from_secs(self.dns.tcp_timeout_secs),
        );

        // Start metrics loop
        let metrics_handle = tokio::spawn(metrics_loop(self.resolver.clone(), shutdown.clone()));

        info!("DNS server ready to serve queries");

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
            }
        }

        shutdown.cancel();
        let _ = metrics_handle.await;
        if let Some(handle) = feed_handle {
            let _ = handle.await;
        }

        info!("DNS server stopped");
        Ok(())
    }
}
