//! lb-dns - A DNS responder that load-balances `A` answers across address pools.
//!
//! Hostnames are bound to named pools either exactly or through a wildcard
//! suffix. Each answer picks the next member of the bound pool in
//! round-robin order. Pool membership and host bindings change at runtime,
//! driven by node and ingress events from an external watcher.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           lb-dns                             │
//! │                                                              │
//! │  ┌──────────────────┐    ┌──────────────────┐                │
//! │  │  Binding feed    │───▶│    Resolver      │                │
//! │  │  (JSON lines)    │    │  (routing table) │                │
//! │  └──────────────────┘    └────────┬─────────┘                │
//! │         ▲                         │                          │
//! │         │ node / ingress          ▼                          │
//! │         │ events           ┌──────────────────┐              │
//! │   external watcher         │  Hickory DNS     │◀── UDP/TCP   │
//! │                            │  Server          │              │
//! │                            └──────────────────┘              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Resolution
//!
//! ```text
//! x.a.example.com.
//!   → exact binding for x.a.example.com?
//!   → wildcard *.x.a.example.com, *.a.example.com, *.example.com, *.com
//!     (longest suffix first)
//!   → next address of the bound pool
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use lb_dns::{Question, Resolver};
//!
//! let resolver = Resolver::new();
//! resolver.add_address("blue", "10.0.0.1");
//! resolver.add_address("blue", "10.0.0.2");
//! resolver.add_host("*.example.com", "blue");
//!
//! let records = resolver.answer(&[Question::a("api.example.com.")]);
//! assert_eq!(records.len(), 1);
//! ```

#![warn(missing_docs)]

pub mod authority;
pub mod binding;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod pool;
pub mod resolver;
pub mod server;
pub mod telemetry;

// Re-export main types
pub use binding::{Binder, BindingEvent};
pub use config::{BindingsConfig, Config, DnsConfig, TelemetryConfig};
pub use error::BalancerError;
pub use pool::AddressPool;
pub use resolver::{AddressRecord, Question, Resolver};
pub use server::DnsServer;
