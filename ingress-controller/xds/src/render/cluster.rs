use crate::envoy::{
    self, Address, ClusterLoadAssignment, ConfigSource, EdsClusterConfig, LbEndpoint, LbPolicy,
    LocalityLbEndpoints, ProtoDuration,
};
use ingress_controller_core::{
    dag::{self, Upstream},
    Dag, LoadBalancerStrategy,
};
use std::{collections::BTreeMap, time::Duration};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

/// Clusters in id order.
pub(super) fn clusters(dag: &Dag) -> impl Iterator<Item = envoy::Cluster> + '_ {
    dag.clusters.values().map(cluster)
}

/// One assignment per endpoint-discovery name, in name order. Clusters that
/// differ only in policy share an assignment.
pub(super) fn load_assignments(dag: &Dag) -> Vec<ClusterLoadAssignment> {
    let by_name = dag
        .clusters
        .values()
        .map(|c| (c.upstream.eds_name(), &c.upstream))
        .collect::<BTreeMap<_, _>>();
    by_name
        .into_iter()
        .map(|(name, upstream)| load_assignment(name, upstream))
        .collect()
}

fn cluster(cluster: &dag::Cluster) -> envoy::Cluster {
    let upstream = &cluster.upstream;
    envoy::Cluster {
        name: cluster.id.to_string(),
        alt_stat_name: format!("{}_{}_{}", upstream.namespace, upstream.name, upstream.port),
        discovery_type: "EDS",
        eds_cluster_config: EdsClusterConfig {
            eds_config: ConfigSource::ads(),
            service_name: upstream.eds_name(),
        },
        connect_timeout: ProtoDuration(CONNECT_TIMEOUT),
        lb_policy: lb_policy(cluster.policy.load_balancer),
    }
}

fn lb_policy(strategy: LoadBalancerStrategy) -> LbPolicy {
    match strategy {
        LoadBalancerStrategy::RoundRobin => LbPolicy::RoundRobin,
        LoadBalancerStrategy::WeightedLeastRequest => LbPolicy::LeastRequest,
        LoadBalancerStrategy::Random => LbPolicy::Random,
        LoadBalancerStrategy::SessionAffinityCookie => LbPolicy::RingHash,
    }
}

fn load_assignment(cluster_name: String, upstream: &Upstream) -> ClusterLoadAssignment {
    let lb_endpoints = upstream
        .endpoints
        .iter()
        .map(|addr| LbEndpoint {
            endpoint: envoy::Endpoint {
                address: Address::socket(addr.ip(), addr.port()),
            },
        })
        .collect::<Vec<_>>();
    let endpoints = if lb_endpoints.is_empty() {
        vec![]
    } else {
        vec![LocalityLbEndpoints { lb_endpoints }]
    };
    ClusterLoadAssignment {
        cluster_name,
        endpoints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingress_controller_core::{ClusterId, ClusterPolicy};
    use serde_json::json;
    use std::num::NonZeroU16;

    fn mk_cluster(lb: LoadBalancerStrategy, endpoints: &[&str]) -> dag::Cluster {
        let policy = ClusterPolicy { load_balancer: lb };
        let port = NonZeroU16::new(80).unwrap();
        dag::Cluster {
            id: ClusterId::new("default", "app", port, &policy),
            upstream: Upstream {
                namespace: "default".to_string(),
                name: "app".to_string(),
                port,
                port_name: Some("http".to_string()),
                endpoints: endpoints.iter().map(|e| e.parse().unwrap()).collect(),
            },
            policy,
        }
    }

    #[test]
    fn renders_cluster() {
        let c = cluster(&mk_cluster(LoadBalancerStrategy::SessionAffinityCookie, &[]));
        assert_eq!(
            serde_json::to_value(c).unwrap(),
            json!({
                "name": "default/app/80/e4f81994fe",
                "alt_stat_name": "default_app_80",
                "type": "EDS",
                "eds_cluster_config": {
                    "eds_config": { "ads": {}, "resource_api_version": "V3" },
                    "service_name": "default/app/http",
                },
                "connect_timeout": "0.250s",
                "lb_policy": "RING_HASH",
            })
        );
    }

    #[test]
    fn shares_assignments_between_policies() {
        let mut dag = Dag::default();
        for c in [
            mk_cluster(LoadBalancerStrategy::RoundRobin, &["10.0.0.1:8080"]),
            mk_cluster(LoadBalancerStrategy::Random, &["10.0.0.1:8080"]),
        ] {
            dag.clusters.insert(c.id.clone(), c);
        }

        assert_eq!(clusters(&dag).count(), 2);
        let clas = load_assignments(&dag);
        assert_eq!(clas.len(), 1);
        assert_eq!(
            serde_json::to_value(&clas[0]).unwrap(),
            json!({
                "cluster_name": "default/app/http",
                "endpoints": [{
                    "lb_endpoints": [{
                        "endpoint": {
                            "address": {
                                "socket_address": { "address": "10.0.0.1", "port_value": 8080 },
                            },
                        },
                    }],
                }],
            })
        );
    }
}
