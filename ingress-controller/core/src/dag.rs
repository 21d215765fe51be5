//! The routing graph.
//!
//! A [`Dag`] is built from scratch from the complete set of configuration
//! objects every time any of them changes. It is a set of tables: virtual hosts
//! own their ordered routes, and routes refer to clusters by [`ClusterId`]
//! rather than by reference. Two graphs built from the same input are therefore
//! structurally equal.

use crate::{ClusterId, ClusterPolicy, RouteTimeouts};
use std::{collections::BTreeMap, net::SocketAddr, num::NonZeroU16};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dag {
    /// Virtual hosts, ordered by fqdn.
    pub virtual_hosts: Vec<VirtualHost>,

    /// Every cluster referenced by a route, deduplicated by id.
    pub clusters: BTreeMap<ClusterId, Cluster>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualHost {
    pub fqdn: String,

    /// Routes in the order the proxy evaluates them; the first match wins.
    pub routes: Vec<Route>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub matches: RouteMatch,
    pub action: RouteAction,
    pub session_affinity: bool,
    pub timeouts: RouteTimeouts,
}

/// Conditions that must all hold for a request to match a route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteMatch {
    pub prefix: String,
    pub headers: Vec<HeaderMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderMatch {
    pub name: String,
    pub kind: HeaderMatchKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderMatchKind {
    Present,
    Exact(String),
    NotExact(String),
    Contains(String),
    NotContains(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteAction {
    SingleCluster(ClusterId),
    WeightedClusters(Vec<WeightedCluster>),
}

/// A route's reference to a cluster. The weight belongs to the reference, not
/// to the cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightedCluster {
    pub cluster: ClusterId,
    pub weight: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cluster {
    pub id: ClusterId,
    pub upstream: Upstream,
    pub policy: ClusterPolicy,
}

/// The service port a cluster sends traffic to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upstream {
    pub namespace: String,
    pub name: String,
    pub port: NonZeroU16,
    pub port_name: Option<String>,

    /// Ready endpoint addresses, sorted.
    pub endpoints: Vec<SocketAddr>,
}

/// Receives each routing graph as soon as it is built.
///
/// Rebuilds are serialized by the caller, so implementations never observe two
/// graphs concurrently.
pub trait Observer {
    fn on_change(&self, dag: &Dag);
}

// === impl Dag ===

impl Dag {
    pub fn virtual_host(&self, fqdn: &str) -> Option<&VirtualHost> {
        self.virtual_hosts.iter().find(|vh| vh.fqdn == fqdn)
    }

    pub fn cluster(&self, id: &ClusterId) -> Option<&Cluster> {
        self.clusters.get(id)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> + '_ {
        self.virtual_hosts.iter().flat_map(|vh| vh.routes.iter())
    }
}

// === impl RouteMatch ===

impl RouteMatch {
    /// Orders matches from most to least specific: longer prefixes first, then
    /// more header conditions.
    pub fn cmp_specificity(&self, other: &Self) -> std::cmp::Ordering {
        other
            .prefix
            .len()
            .cmp(&self.prefix.len())
            .then_with(|| other.headers.len().cmp(&self.headers.len()))
    }
}

impl Default for RouteMatch {
    fn default() -> Self {
        Self {
            prefix: "/".to_string(),
            headers: vec![],
        }
    }
}

// === impl RouteAction ===

impl RouteAction {
    /// A single backend is a plain cluster reference; more than one becomes a
    /// weighted split.
    pub fn from_backends(mut backends: Vec<WeightedCluster>) -> Option<Self> {
        match backends.len() {
            0 => None,
            1 => backends.pop().map(|b| Self::SingleCluster(b.cluster)),
            _ => Some(Self::WeightedClusters(backends)),
        }
    }

    pub fn clusters(&self) -> impl Iterator<Item = &ClusterId> + '_ {
        let (single, weighted) = match self {
            Self::SingleCluster(id) => (Some(id), &[][..]),
            Self::WeightedClusters(clusters) => (None, clusters.as_slice()),
        };
        single.into_iter().chain(weighted.iter().map(|wc| &wc.cluster))
    }
}

// === impl Upstream ===

impl Upstream {
    /// The endpoint-discovery name shared by every cluster on this service port.
    pub fn eds_name(&self) -> String {
        match self.port_name.as_deref() {
            Some(port_name) if !port_name.is_empty() => {
                format!("{}/{}/{port_name}", self.namespace, self.name)
            }
            _ => format!("{}/{}", self.namespace, self.name),
        }
    }
}
