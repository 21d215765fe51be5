//! Proxy-facing resource types.
//!
//! These mirror the subset of the Envoy v3 API that the controller renders.
//! Field names follow the proto field names; resources serialize as JSON
//! objects tagged with their type URL in `@type`.

use serde::{Serialize, Serializer};
use std::{fmt, str::FromStr, time::Duration};

pub const LISTENER_TYPE_URL: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";
pub const ROUTE_TYPE_URL: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
pub const CLUSTER_TYPE_URL: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
pub const ENDPOINT_TYPE_URL: &str =
    "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";

/// The resource types served by the discovery server.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeUrl {
    Listener,
    RouteConfiguration,
    Cluster,
    ClusterLoadAssignment,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown type URL: {0}")]
pub struct UnknownTypeUrl(pub String);

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "@type")]
pub enum Resource {
    #[serde(rename = "type.googleapis.com/envoy.config.listener.v3.Listener")]
    Listener(Listener),
    #[serde(rename = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration")]
    RouteConfiguration(RouteConfiguration),
    #[serde(rename = "type.googleapis.com/envoy.config.cluster.v3.Cluster")]
    Cluster(Cluster),
    #[serde(rename = "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment")]
    ClusterLoadAssignment(ClusterLoadAssignment),
}

/// A duration in protobuf-JSON form, e.g. `7s` or `0.250s`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtoDuration(pub Duration);

// === Listener ===

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Listener {
    pub name: String,
    pub address: Address,
    pub socket_options: Vec<SocketOption>,
    pub filter_chains: Vec<FilterChain>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Address {
    pub socket_address: SocketAddress,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SocketAddress {
    pub address: String,
    pub port_value: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SocketOption {
    pub description: &'static str,
    pub level: i64,
    pub name: i64,
    pub int_value: i64,
    pub state: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterChain {
    pub filters: Vec<Filter>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Filter {
    pub name: &'static str,
    pub typed_config: FilterConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "@type")]
pub enum FilterConfig {
    #[serde(rename = "type.googleapis.com/envoy.extensions.access_loggers.file.v3.FileAccessLog")]
    FileAccessLog { path: String },

    #[serde(
        rename = "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager"
    )]
    HttpConnectionManager(Box<HttpConnectionManager>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HttpConnectionManager {
    pub stat_prefix: String,
    pub rds: Rds,
    pub http_filters: Vec<HttpFilter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_http_protocol_options: Option<HttpProtocolOptions>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_idle_timeout: Option<ProtoDuration>,

    /// The connection shutdown grace period.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain_timeout: Option<ProtoDuration>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rds {
    pub route_config_name: String,
    pub config_source: ConfigSource,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigSource {
    pub ads: Ads,
    pub resource_api_version: &'static str,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Ads {}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HttpFilter {
    pub name: &'static str,
    pub typed_config: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HttpProtocolOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<ProtoDuration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connection_duration: Option<ProtoDuration>,
}

// === RouteConfiguration ===

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteConfiguration {
    pub name: String,
    pub virtual_hosts: Vec<VirtualHost>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VirtualHost {
    pub name: String,
    pub domains: Vec<String>,
    pub routes: Vec<Route>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Route {
    #[serde(rename = "match")]
    pub matches: RouteMatch,
    pub route: RouteAction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    pub prefix: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderMatcher>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HeaderMatcher {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub present_match: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_match: Option<StringMatcher>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub invert_match: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StringMatcher {
    Exact(String),
    Contains(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RouteAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_clusters: Option<WeightedClusters>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hash_policy: Vec<HashPolicy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<ProtoDuration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<ProtoDuration>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WeightedClusters {
    pub clusters: Vec<ClusterWeight>,
    pub total_weight: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClusterWeight {
    pub name: String,
    pub weight: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HashPolicy {
    pub cookie: Cookie,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cookie {
    pub name: &'static str,
    pub ttl: ProtoDuration,
    pub path: &'static str,
}

// === Cluster ===

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub name: String,
    pub alt_stat_name: String,
    #[serde(rename = "type")]
    pub discovery_type: &'static str,
    pub eds_cluster_config: EdsClusterConfig,
    pub connect_timeout: ProtoDuration,
    pub lb_policy: LbPolicy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EdsClusterConfig {
    pub eds_config: ConfigSource,
    pub service_name: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LbPolicy {
    RoundRobin,
    LeastRequest,
    Random,
    RingHash,
}

// === ClusterLoadAssignment ===

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClusterLoadAssignment {
    pub cluster_name: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<LocalityLbEndpoints>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LocalityLbEndpoints {
    pub lb_endpoints: Vec<LbEndpoint>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LbEndpoint {
    pub endpoint: Endpoint,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub address: Address,
}

// === impl TypeUrl ===

impl TypeUrl {
    pub const ALL: [Self; 4] = [
        Self::Listener,
        Self::RouteConfiguration,
        Self::Cluster,
        Self::ClusterLoadAssignment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listener => LISTENER_TYPE_URL,
            Self::RouteConfiguration => ROUTE_TYPE_URL,
            Self::Cluster => CLUSTER_TYPE_URL,
            Self::ClusterLoadAssignment => ENDPOINT_TYPE_URL,
        }
    }

    /// The short name used in metric labels and REST paths.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Listener => "listeners",
            Self::RouteConfiguration => "routes",
            Self::Cluster => "clusters",
            Self::ClusterLoadAssignment => "endpoints",
        }
    }

    pub fn from_short_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.short_name() == name)
    }
}

impl FromStr for TypeUrl {
    type Err = UnknownTypeUrl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTypeUrl(s.to_string()))
    }
}

impl fmt::Display for TypeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Resource ===

impl Resource {
    pub fn name(&self) -> &str {
        match self {
            Self::Listener(l) => &l.name,
            Self::RouteConfiguration(rc) => &rc.name,
            Self::Cluster(c) => &c.name,
            Self::ClusterLoadAssignment(cla) => &cla.cluster_name,
        }
    }

    pub fn type_url(&self) -> TypeUrl {
        match self {
            Self::Listener(_) => TypeUrl::Listener,
            Self::RouteConfiguration(_) => TypeUrl::RouteConfiguration,
            Self::Cluster(_) => TypeUrl::Cluster,
            Self::ClusterLoadAssignment(_) => TypeUrl::ClusterLoadAssignment,
        }
    }
}

// === impl Address ===

impl Address {
    pub fn socket(address: impl ToString, port: u16) -> Self {
        Self {
            socket_address: SocketAddress {
                address: address.to_string(),
                port_value: port,
            },
        }
    }
}

// === impl ConfigSource ===

impl ConfigSource {
    /// Resources are fetched over the same aggregated stream as the listener.
    pub fn ads() -> Self {
        Self {
            ads: Ads {},
            resource_api_version: "V3",
        }
    }
}

// === impl ProtoDuration ===

impl From<Duration> for ProtoDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl fmt::Display for ProtoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        let nanos = self.0.subsec_nanos();
        if nanos == 0 {
            write!(f, "{secs}s")
        } else if nanos % 1_000_000 == 0 {
            write!(f, "{secs}.{:03}s", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            write!(f, "{secs}.{:06}s", nanos / 1_000)
        } else {
            write!(f, "{secs}.{nanos:09}s")
        }
    }
}

impl Serialize for ProtoDuration {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proto_durations() {
        let fmt = |d: Duration| ProtoDuration(d).to_string();
        assert_eq!(fmt(Duration::ZERO), "0s");
        assert_eq!(fmt(Duration::from_secs(7000)), "7000s");
        assert_eq!(fmt(Duration::from_millis(250)), "0.250s");
        assert_eq!(fmt(Duration::from_micros(1_500_001)), "1.500001s");
        assert_eq!(fmt(Duration::from_nanos(5)), "0.000000005s");
    }

    #[test]
    fn type_urls() {
        for t in TypeUrl::ALL {
            assert_eq!(t.as_str().parse::<TypeUrl>(), Ok(t));
            assert_eq!(TypeUrl::from_short_name(t.short_name()), Some(t));
        }
        assert_eq!(
            "type.googleapis.com/envoy.config.core.v3.Secret".parse::<TypeUrl>(),
            Err(UnknownTypeUrl(
                "type.googleapis.com/envoy.config.core.v3.Secret".to_string()
            ))
        );
    }

    #[test]
    fn resources_are_tagged() {
        let cla = Resource::ClusterLoadAssignment(ClusterLoadAssignment {
            cluster_name: "default/app".to_string(),
            endpoints: vec![],
        });
        assert_eq!(
            serde_json::to_value(&cla).unwrap(),
            serde_json::json!({
                "@type": ENDPOINT_TYPE_URL,
                "cluster_name": "default/app",
            })
        );
        assert_eq!(cla.type_url(), TypeUrl::ClusterLoadAssignment);
        assert_eq!(cla.name(), "default/app");
    }
}
