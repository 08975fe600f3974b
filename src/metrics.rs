//! Metrics instrumentation for lb-dns.
//!
//! All metrics are prefixed with `lb_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a DNS query.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Answered => "answered",
        QueryResult::NoAnswer => "no_answer",
        QueryResult::Unsupported => "unsupported",
    };

    counter!("lb_dns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("lb_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// An address was selected and returned.
    Answered,
    /// The name is unbound or its pool is empty.
    NoAnswer,
    /// Record type other than `A`.
    Unsupported,
}

/// Record a binding event applied to the routing table.
pub fn record_binding_event(kind: &str, action: BindingAction) {
    let action_str = match action {
        BindingAction::Apply => "apply",
        BindingAction::Withdraw => "withdraw",
        BindingAction::Skip => "skip",
    };

    counter!("lb_dns.binding.event.count", "kind" => kind.to_string(), "action" => action_str)
        .increment(1);
}

/// What a reconciler did with an event.
#[derive(Debug, Clone, Copy)]
pub enum BindingAction {
    /// Addresses or hosts were bound.
    Apply,
    /// Addresses or hosts were unbound.
    Withdraw,
    /// No routing class, nothing bound.
    Skip,
}

/// Record a feed line that could not be decoded.
pub fn record_feed_decode_error() {
    counter!("lb_dns.feed.decode_error.count").increment(1);
}

/// Record an accepted feed connection.
pub fn record_feed_connection() {
    counter!("lb_dns.feed.connection.count").increment(1);
}

/// Record routing table sizes.
pub fn record_table_counts(
    pools: usize,
    exact_hosts: usize,
    wildcard_hosts: usize,
    addresses: usize,
) {
    gauge!("lb_dns.table.pools.count").set(pools as f64);
    gauge!("lb_dns.table.hosts.exact.count").set(exact_hosts as f64);
    gauge!("lb_dns.table.hosts.wildcard.count").set(wildcard_hosts as f64);
    gauge!("lb_dns.table.addresses.count").set(addresses as f64);
}

/// Record pools that currently have no members.
pub fn record_empty_pools(count: usize) {
    gauge!("lb_dns.table.pools.empty").set(count as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
