//! Configuration types for lb-dns.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::BalancerError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Binding sources configuration.
    #[serde(default)]
    pub bindings: BindingsConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), BalancerError> {
        for pool in &self.bindings.pools {
            if pool.name.is_empty() {
                return Err(BalancerError::Config("static pool with empty name".into()));
            }
        }

        for host in &self.bindings.hosts {
            if host.pattern.is_empty() || host.pool.is_empty() {
                return Err(BalancerError::Config(format!(
                    "static host binding needs a pattern and a pool (pattern={:?}, pool={:?})",
                    host.pattern, host.pool
                )));
            }
        }

        Ok(())
    }
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for DNS server to listen on (UDP and TCP).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Idle timeout for TCP connections, in seconds.
    #[serde(default = "default_tcp_timeout_secs")]
    pub tcp_timeout_secs: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            tcp_timeout_secs: default_tcp_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5353))
}

fn default_tcp_timeout_secs() -> u64 {
    30
}

/// Where pool memberships and host bindings come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingsConfig {
    /// Pool used for nodes without a routing class annotation.
    #[serde(default)]
    pub default_node_class: Option<String>,

    /// Pool used for ingresses without a routing class annotation.
    #[serde(default = "default_ingress_class")]
    pub default_ingress_class: Option<String>,

    /// Address of the newline-delimited JSON binding feed.
    #[serde(default)]
    pub feed_addr: Option<SocketAddr>,

    /// Pools populated at startup.
    #[serde(default)]
    pub pools: Vec<StaticPool>,

    /// Host bindings applied at startup.
    #[serde(default)]
    pub hosts: Vec<StaticHost>,
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            default_node_class: None,
            default_ingress_class: default_ingress_class(),
            feed_addr: None,
            pools: Vec::new(),
            hosts: Vec::new(),
        }
    }
}

fn default_ingress_class() -> Option<String> {
    Some("default".to_string())
}

/// A pool and its initial members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticPool {
    /// Pool name.
    pub name: String,
    /// Initial members.
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// A hostname or wildcard bound at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticHost {
    /// Hostname or `*.suffix` pattern.
    pub pattern: String,
    /// Pool name.
    pub pool: String,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "lb_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "lb-dns".to_string()
}
