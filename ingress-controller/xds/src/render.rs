//! Renders a routing graph into proxy resources.
//!
//! Rendering is a pure function of the graph and the listener configuration:
//! equal inputs always produce equal, identically ordered resources.

use crate::envoy::{Resource, TypeUrl};
use ingress_controller_core::{Dag, TimeoutPolicy};
use std::net::{IpAddr, Ipv4Addr};

mod cluster;
mod listener;
mod route;

pub const DEFAULT_LISTENER_NAME: &str = "ingress_http";
pub const DEFAULT_ACCESS_LOG_PATH: &str = "/dev/stdout";
pub const DEFAULT_PORT: u16 = 8080;

/// Settings for the HTTP listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Names the listener, its route configuration and its stats prefix.
    pub name: String,
    pub address: IpAddr,
    pub port: u16,
    pub access_log_path: String,

    /// Timeouts set explicitly on this listener.
    pub timeouts: TimeoutPolicy,

    /// Process-wide timeouts, used for each field the listener leaves unset.
    pub default_timeouts: TimeoutPolicy,
}

/// Rendered resources, grouped by type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resources {
    pub listeners: Vec<Resource>,
    pub route_configurations: Vec<Resource>,
    pub clusters: Vec<Resource>,
    pub cluster_load_assignments: Vec<Resource>,
}

pub fn render(dag: &Dag, config: &ListenerConfig) -> Resources {
    // The listener is only needed once there is something to route to.
    let listeners = if dag.virtual_hosts.is_empty() {
        vec![]
    } else {
        vec![Resource::Listener(listener::listener(config))]
    };

    Resources {
        listeners,
        route_configurations: vec![Resource::RouteConfiguration(route::route_configuration(
            &config.name,
            dag,
        ))],
        clusters: cluster::clusters(dag).map(Resource::Cluster).collect(),
        cluster_load_assignments: cluster::load_assignments(dag)
            .into_iter()
            .map(Resource::ClusterLoadAssignment)
            .collect(),
    }
}

// === impl ListenerConfig ===

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_LISTENER_NAME.to_string(),
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            access_log_path: DEFAULT_ACCESS_LOG_PATH.to_string(),
            timeouts: TimeoutPolicy::default(),
            default_timeouts: TimeoutPolicy::default(),
        }
    }
}

// === impl Resources ===

impl Resources {
    pub fn get(&self, type_url: TypeUrl) -> &[Resource] {
        match type_url {
            TypeUrl::Listener => &self.listeners,
            TypeUrl::RouteConfiguration => &self.route_configurations,
            TypeUrl::Cluster => &self.clusters,
            TypeUrl::ClusterLoadAssignment => &self.cluster_load_assignments,
        }
    }

    pub fn into_typed(self) -> [(TypeUrl, Vec<Resource>); 4] {
        [
            (TypeUrl::Listener, self.listeners),
            (TypeUrl::RouteConfiguration, self.route_configurations),
            (TypeUrl::Cluster, self.clusters),
            (TypeUrl::ClusterLoadAssignment, self.cluster_load_assignments),
        ]
    }
}
