//! Routing table mapping hostnames to address pools.
//!
//! Hostnames bind to pools either exactly (`api.example.com`) or through a
//! wildcard suffix (`*.example.com`). Pools are stored once in an arena and
//! referenced by [`PoolId`], so every binding to a pool observes membership
//! changes immediately.
//!
//! Wildcard keys are stored with their labels reversed (`com.example`).
//! Resolution reverses the queried name the same way and strips labels from
//! the specific end until a key matches, which yields longest-suffix-wins
//! semantics with one hash lookup per label.

use hickory_proto::rr::RecordType;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::metrics;
use crate::pool::AddressPool;

/// Leading token that marks a hostname pattern as a wildcard.
pub const WILDCARD_TOKEN: char = '*';

/// Index of a pool in the routing table's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(usize);

/// A single question to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Queried name, with or without the trailing root separator.
    pub name: String,
    /// Queried record type.
    pub record_type: RecordType,
}

impl Question {
    /// Build an `A` question for `name`.
    pub fn a(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::A,
        }
    }
}

/// A synthesized address record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    /// Name exactly as it was queried.
    pub name: String,
    /// Selected pool member.
    pub address: Ipv4Addr,
}

/// Thread-safe routing table handle.
///
/// Cloning is cheap and every clone shares the same table.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    inner: Arc<RwLock<RoutingTable>>,
}

#[derive(Debug, Default)]
struct RoutingTable {
    /// Pool storage. Entries are never removed.
    pools: Vec<AddressPool>,

    /// pool name -> arena index
    pools_by_name: HashMap<String, PoolId>,

    /// normalized hostname -> pool
    hosts_exact: HashMap<String, PoolId>,

    /// reversed wildcard suffix -> pool
    hosts_wildcard: HashMap<String, PoolId>,
}

impl RoutingTable {
    fn ensure_pool(&mut self, name: &str) -> PoolId {
        if let Some(id) = self.pools_by_name.get(name) {
            return *id;
        }

        let id = PoolId(self.pools.len());
        self.pools.push(AddressPool::new());
        self.pools_by_name.insert(name.to_string(), id);
        debug!(pool = name, "created pool");
        id
    }

    fn pool(&self, id: PoolId) -> &AddressPool {
        &self.pools[id.0]
    }

    fn resolve(&self, name: &str) -> Option<&str> {
        let host = normalize_host(name);

        if let Some(id) = self.hosts_exact.get(&host) {
            trace!(name = %host, "exact match");
            return self.pool(*id).next();
        }

        let mut labels: Vec<&str> = host.split('.').rev().collect();
        while !labels.is_empty() {
            let key = labels.join(".");
            if let Some(id) = self.hosts_wildcard.get(&key) {
                trace!(name = %host, suffix = %key, "wildcard match");
                return self.pool(*id).next();
            }
            labels.pop();
        }

        None
    }
}

impl Resolver {
    /// Create an empty routing table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address to a pool, creating the pool if needed.
    pub fn add_address(&self, pool: &str, addr: &str) {
        let mut inner = self.inner.write();
        let id = inner.ensure_pool(pool);
        inner.pools[id.0].add_address(addr);
        debug!(pool, addr, "added address");
    }

    /// Remove an address from a pool. Unknown pools are ignored.
    pub fn remove_address(&self, pool: &str, addr: &str) {
        let mut inner = self.inner.write();
        if let Some(id) = inner.pools_by_name.get(pool).copied() {
            inner.pools[id.0].remove_address(addr);
            debug!(pool, addr, "removed address");
        }
    }

    /// Bind a hostname or wildcard pattern to a pool.
    ///
    /// An existing binding for the same pattern is replaced.
    pub fn add_host(&self, pattern: &str, pool: &str) {
        let mut inner = self.inner.write();
        let id = inner.ensure_pool(pool);

        if is_wildcard(pattern) {
            let key = normalize_wildcard(pattern);
            debug!(pattern, key = %key, pool, "bound wildcard");
            inner.hosts_wildcard.insert(key, id);
        } else {
            let key = normalize_host(pattern);
            debug!(host = %key, pool, "bound host");
            inner.hosts_exact.insert(key, id);
        }
    }

    /// Remove the binding for a hostname or wildcard pattern.
    pub fn remove_host(&self, pattern: &str) {
        let mut inner = self.inner.write();

        let removed = if is_wildcard(pattern) {
            inner.hosts_wildcard.remove(&normalize_wildcard(pattern))
        } else {
            inner.hosts_exact.remove(&normalize_host(pattern))
        };

        if removed.is_some() {
            debug!(pattern, "unbound host");
        }
    }

    /// Answer a batch of questions.
    ///
    /// Only `A` questions whose name resolves to a pool member produce a
    /// record. Output order follows input order.
    pub fn answer(&self, questions: &[Question]) -> Vec<AddressRecord> {
        let inner = self.inner.read();

        questions
            .iter()
            .filter(|q| q.record_type == RecordType::A)
            .filter_map(|q| {
                let selected = inner.resolve(&q.name)?;
                match selected.parse::<Ipv4Addr>() {
                    Ok(address) => Some(AddressRecord {
                        name: q.name.clone(),
                        address,
                    }),
                    Err(_) => {
                        debug!(name = %q.name, addr = selected, "dropping non-IPv4 pool member");
                        None
                    }
                }
            })
            .collect()
    }

    /// Current members of a named pool, if it exists.
    pub fn pool_addresses(&self, pool: &str) -> Option<Vec<String>> {
        let inner = self.inner.read();
        let id = inner.pools_by_name.get(pool)?;
        Some(inner.pool(*id).addresses().to_vec())
    }

    /// Get count of pools ever referenced.
    pub fn pools_count(&self) -> usize {
        self.inner.read().pools.len()
    }

    /// Get count of exact hostname bindings.
    pub fn exact_hosts_count(&self) -> usize {
        self.inner.read().hosts_exact.len()
    }

    /// Get count of wildcard bindings.
    pub fn wildcard_hosts_count(&self) -> usize {
        self.inner.read().hosts_wildcard.len()
    }

    /// Get total addresses across all pools.
    pub fn addresses_count(&self) -> usize {
        self.inner.read().pools.iter().map(AddressPool::len).sum()
    }

    /// Emit current routing table metrics.
    pub fn emit_metrics(&self) {
        let inner = self.inner.read();

        let addresses = inner.pools.iter().map(AddressPool::len).sum();
        let empty = inner.pools.iter().filter(|p| p.is_empty()).count();

        metrics::record_table_counts(
            inner.pools.len(),
            inner.hosts_exact.len(),
            inner.hosts_wildcard.len(),
            addresses,
        );
        metrics::record_empty_pools(empty);
    }
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.starts_with(WILDCARD_TOKEN)
}

/// Lowercase and drop a single trailing root separator.
fn normalize_host(name: &str) -> String {
    let name = name.strip_suffix('.').unwrap_or(name);
    name.to_ascii_lowercase()
}

/// Turn `*.a.example.com` into `com.example.a`.
fn normalize_wildcard(pattern: &str) -> String {
    let suffix = pattern.strip_prefix(WILDCARD_TOKEN).unwrap_or(pattern);
    let suffix = suffix.strip_prefix('.').unwrap_or(suffix);
    let suffix = normalize_host(suffix);

    suffix.split('.').rev().collect::<Vec<_>>().join(".")
}
