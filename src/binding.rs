//! Reconcilers that turn cluster resources into routing table bindings.
//!
//! Nodes contribute addresses to a pool, ingresses bind their hosts to a
//! pool. The pool is the resource's routing class annotation, falling back
//! to a configured default. A resource with neither is left unbound.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::BindingsConfig;
use crate::metrics::{self, BindingAction};
use crate::resolver::Resolver;

/// Annotation selecting the pool a resource is bound to.
pub const ROUTING_CLASS_ANNOTATION: &str = "lb-dns/routing-class";

/// Pick the pool for a resource.
///
/// Empty strings count as unset on both the annotation and the default.
pub fn routing_class(
    annotations: &HashMap<String, String>,
    default: Option<&str>,
) -> Option<String> {
    annotations
        .get(ROUTING_CLASS_ANNOTATION)
        .map(String::as_str)
        .filter(|class| !class.is_empty())
        .or(default.filter(|class| !class.is_empty()))
        .map(String::from)
}

/// Kind of a node address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAddressType {
    /// Routable from outside the cluster.
    ExternalIP,
    /// Routable inside the cluster.
    InternalIP,
    /// Node hostname, never pooled.
    Hostname,
    /// Anything else reported by the node.
    #[serde(other)]
    Other,
}

/// One address reported by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    /// Address kind.
    #[serde(rename = "type")]
    pub kind: NodeAddressType,
    /// Address value.
    pub address: String,
}

/// Snapshot of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node name.
    pub name: String,
    /// Resource annotations.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// Reported addresses.
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,
    /// Cordoned nodes stop receiving traffic.
    #[serde(default)]
    pub unschedulable: bool,
    /// Set once the node is being deleted.
    #[serde(default)]
    pub deleting: bool,
}

/// Snapshot of an ingress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingress {
    /// Namespace.
    pub namespace: String,
    /// Ingress name.
    pub name: String,
    /// Resource annotations.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// Rule hosts, exact or `*.suffix`.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Set once the ingress is being deleted.
    #[serde(default)]
    pub deleting: bool,
}

impl Ingress {
    fn key(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    fn rule_hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str).filter(|h| !h.is_empty())
    }
}

/// A resource change delivered by a binding source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BindingEvent {
    /// Node created, updated or deleted.
    Node(Node),
    /// Ingress created, updated or deleted.
    Ingress(Ingress),
}

/// Keeps node addresses in their pools.
#[derive(Debug, Clone)]
pub struct NodeReconciler {
    resolver: Resolver,
    default_node_class: Option<String>,
}

impl NodeReconciler {
    /// Create a reconciler writing into `resolver`.
    pub fn new(resolver: Resolver, default_node_class: Option<String>) -> Self {
        Self {
            resolver,
            default_node_class,
        }
    }

    /// Apply the current state of a node.
    pub fn reconcile(&self, node: &Node) -> BindingAction {
        let Some(pool) = routing_class(&node.annotations, self.default_node_class.as_deref())
        else {
            trace!(node = %node.name, "node has no routing class");
            return BindingAction::Skip;
        };

        let pooled = node.addresses.iter().filter(|a| {
            matches!(
                a.kind,
                NodeAddressType::ExternalIP | NodeAddressType::InternalIP
            )
        });

        if node.deleting || node.unschedulable {
            for addr in pooled {
                self.resolver.remove_address(&pool, &addr.address);
            }
            debug!(node = %node.name, pool = %pool, "withdrew node addresses");
            return BindingAction::Withdraw;
        }

        for addr in pooled {
            self.resolver.add_address(&pool, &addr.address);
        }
        debug!(node = %node.name, pool = %pool, "applied node addresses");
        BindingAction::Apply
    }
}

/// Keeps ingress hosts bound to their pools.
#[derive(Debug, Clone)]
pub struct IngressReconciler {
    resolver: Resolver,
    default_ingress_class: Option<String>,

    /// `namespace:name` -> hosts bound on the last reconcile
    ingress_hosts: HashMap<String, Vec<String>>,
}

impl IngressReconciler {
    /// Create a reconciler writing into `resolver`.
    pub fn new(resolver: Resolver, default_ingress_class: Option<String>) -> Self {
        Self {
            resolver,
            default_ingress_class,
            ingress_hosts: HashMap::new(),
        }
    }

    /// Apply the current state of an ingress.
    pub fn reconcile(&mut self, ingress: &Ingress) -> BindingAction {
        if ingress.deleting {
            self.on_delete(ingress)
        } else {
            self.on_change(ingress)
        }
    }

    /// Hosts currently bound for an ingress.
    pub fn tracked_hosts(&self, namespace: &str, name: &str) -> Option<&[String]> {
        self.ingress_hosts
            .get(&format!("{}:{}", namespace, name))
            .map(Vec::as_slice)
    }

    fn on_delete(&mut self, ingress: &Ingress) -> BindingAction {
        for host in ingress.rule_hosts() {
            self.resolver.remove_host(host);
        }

        if let Some(previous) = self.ingress_hosts.remove(&ingress.key()) {
            for host in &previous {
                self.resolver.remove_host(host);
            }
        }

        debug!(ingress = %ingress.key(), "unbound deleted ingress");
        BindingAction::Withdraw
    }

    fn on_change(&mut self, ingress: &Ingress) -> BindingAction {
        let key = ingress.key();

        if let Some(previous) = self.ingress_hosts.remove(&key) {
            for host in &previous {
                self.resolver.remove_host(host);
            }
        }

        let Some(pool) =
            routing_class(&ingress.annotations, self.default_ingress_class.as_deref())
        else {
            trace!(ingress = %key, "ingress has no routing class");
            return BindingAction::Skip;
        };

        let hosts: Vec<String> = ingress.rule_hosts().map(String::from).collect();
        for host in &hosts {
            self.resolver.add_host(host, &pool);
        }

        debug!(ingress = %key, pool = %pool, hosts = hosts.len(), "bound ingress hosts");
        self.ingress_hosts.insert(key, hosts);
        BindingAction::Apply
    }
}

/// Routes binding events to the matching reconciler.
#[derive(Debug, Clone)]
pub struct Binder {
    nodes: NodeReconciler,
    ingresses: IngressReconciler,
}

/// Binder shared between feed connections.
pub type SharedBinder = Arc<Mutex<Binder>>;

impl Binder {
    /// Create a binder for the given resolver and defaults.
    pub fn new(resolver: Resolver, config: &BindingsConfig) -> Self {
        Self {
            nodes: NodeReconciler::new(resolver.clone(), config.default_node_class.clone()),
            ingresses: IngressReconciler::new(resolver, config.default_ingress_class.clone()),
        }
    }

    /// Wrap for sharing across tasks.
    pub fn shared(self) -> SharedBinder {
        Arc::new(Mutex::new(self))
    }

    /// Apply a single event.
    pub fn apply(&mut self, event: &BindingEvent) -> BindingAction {
        let (kind, action) = match event {
            BindingEvent::Node(node) => ("node", self.nodes.reconcile(node)),
            BindingEvent::Ingress(ingress) => ("ingress", self.ingresses.reconcile(ingress)),
        };

        metrics::record_binding_event(kind, action);
        action
    }

    /// Access the ingress reconciler.
    pub fn ingresses(&self) -> &IngressReconciler {
        &self.ingresses
    }
}

/// Seed the routing table from static configuration.
pub fn apply_static(resolver: &Resolver, config: &BindingsConfig) {
    for pool in &config.pools {
        for addr in &pool.addresses {
            resolver.add_address(&pool.name, addr);
        }
    }

    for host in &config.hosts {
        resolver.add_host(&host.pattern, &host.pool);
    }

    debug!(
        pools = config.pools.len(),
        hosts = config.hosts.len(),
        "applied static bindings"
    );
}
