//! Error types for lb-dns.

use thiserror::Error;

/// Errors that can occur around the DNS server.
///
/// Resolution itself never fails; these cover sockets, configuration and
/// the binding feed.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}
