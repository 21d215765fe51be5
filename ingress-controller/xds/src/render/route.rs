use crate::envoy::{
    ClusterWeight, Cookie, HashPolicy, HeaderMatcher, ProtoDuration, Route, RouteAction,
    RouteConfiguration, RouteMatch, StringMatcher, VirtualHost, WeightedClusters,
};
use ingress_controller_core::{
    cluster::{hashname, MAX_NAME_LEN},
    dag::{self, HeaderMatchKind},
    Dag,
};
use std::time::Duration;

pub(crate) const SESSION_AFFINITY_COOKIE: &str = "X-Session-Affinity";

pub(super) fn route_configuration(name: &str, dag: &Dag) -> RouteConfiguration {
    RouteConfiguration {
        name: name.to_string(),
        virtual_hosts: dag.virtual_hosts.iter().map(virtual_host).collect(),
    }
}

fn virtual_host(vhost: &dag::VirtualHost) -> VirtualHost {
    VirtualHost {
        name: hashname(MAX_NAME_LEN, &[vhost.fqdn.as_str()]),
        domains: vec![vhost.fqdn.clone()],
        routes: vhost.routes.iter().map(route).collect(),
    }
}

fn route(route: &dag::Route) -> Route {
    let mut action = match &route.action {
        dag::RouteAction::SingleCluster(id) => RouteAction {
            cluster: Some(id.to_string()),
            ..Default::default()
        },
        dag::RouteAction::WeightedClusters(backends) => RouteAction {
            weighted_clusters: Some(WeightedClusters {
                clusters: backends
                    .iter()
                    .map(|wc| ClusterWeight {
                        name: wc.cluster.to_string(),
                        weight: wc.weight,
                    })
                    .collect(),
                total_weight: backends
                    .iter()
                    .fold(0u32, |sum, wc| sum.saturating_add(wc.weight)),
            }),
            ..Default::default()
        },
    };

    // The hash policy applies to whichever cluster the request is routed to,
    // so it covers every weighted entry alike.
    if route.session_affinity {
        action.hash_policy.push(HashPolicy {
            cookie: Cookie {
                name: SESSION_AFFINITY_COOKIE,
                ttl: ProtoDuration(Duration::ZERO),
                path: "/",
            },
        });
    }
    action.timeout = route.timeouts.response.duration().map(ProtoDuration);
    action.idle_timeout = route.timeouts.idle.duration().map(ProtoDuration);

    Route {
        matches: RouteMatch {
            prefix: route.matches.prefix.clone(),
            headers: route.matches.headers.iter().map(header_matcher).collect(),
        },
        route: action,
    }
}

fn header_matcher(header: &dag::HeaderMatch) -> HeaderMatcher {
    let (present_match, string_match, invert_match) = match &header.kind {
        HeaderMatchKind::Present => (Some(true), None, false),
        HeaderMatchKind::Exact(v) => (None, Some(StringMatcher::Exact(v.clone())), false),
        HeaderMatchKind::NotExact(v) => (None, Some(StringMatcher::Exact(v.clone())), true),
        HeaderMatchKind::Contains(v) => (None, Some(StringMatcher::Contains(v.clone())), false),
        HeaderMatchKind::NotContains(v) => (None, Some(StringMatcher::Contains(v.clone())), true),
    };
    HeaderMatcher {
        name: header.name.clone(),
        present_match,
        string_match,
        invert_match,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingress_controller_core::{
        dag::{HeaderMatch, WeightedCluster},
        ClusterId, ClusterPolicy, RouteTimeouts, Setting,
    };
    use serde_json::json;
    use std::num::NonZeroU16;

    fn id(port: u16) -> ClusterId {
        ClusterId::new(
            "default",
            "app",
            NonZeroU16::new(port).unwrap(),
            &ClusterPolicy::default(),
        )
    }

    #[test]
    fn renders_headers_and_timeouts() {
        let r = dag::Route {
            matches: dag::RouteMatch {
                prefix: "/api".to_string(),
                headers: vec![
                    HeaderMatch {
                        name: "x-canary".to_string(),
                        kind: HeaderMatchKind::Present,
                    },
                    HeaderMatch {
                        name: "x-env".to_string(),
                        kind: HeaderMatchKind::NotContains("dev".to_string()),
                    },
                ],
            },
            action: dag::RouteAction::SingleCluster(id(80)),
            session_affinity: false,
            timeouts: RouteTimeouts {
                response: Setting::Value(Duration::from_millis(1500)),
                idle: Setting::Disabled,
            },
        };

        assert_eq!(
            serde_json::to_value(route(&r)).unwrap(),
            json!({
                "match": {
                    "prefix": "/api",
                    "headers": [
                        { "name": "x-canary", "present_match": true },
                        { "name": "x-env", "string_match": { "contains": "dev" }, "invert_match": true },
                    ],
                },
                "route": {
                    "cluster": "default/app/80/da39a3ee5e",
                    "timeout": "1.500s",
                    "idle_timeout": "0s",
                },
            })
        );
    }

    #[test]
    fn renders_weighted_clusters_with_affinity() {
        let r = dag::Route {
            matches: dag::RouteMatch::default(),
            action: dag::RouteAction::WeightedClusters(vec![
                WeightedCluster {
                    cluster: id(80),
                    weight: 1,
                },
                WeightedCluster {
                    cluster: id(8080),
                    weight: 3,
                },
            ]),
            session_affinity: true,
            timeouts: RouteTimeouts::default(),
        };

        assert_eq!(
            serde_json::to_value(route(&r)).unwrap(),
            json!({
                "match": { "prefix": "/" },
                "route": {
                    "weighted_clusters": {
                        "clusters": [
                            { "name": "default/app/80/da39a3ee5e", "weight": 1 },
                            { "name": "default/app/8080/da39a3ee5e", "weight": 3 },
                        ],
                        "total_weight": 4,
                    },
                    "hash_policy": [{
                        "cookie": { "name": "X-Session-Affinity", "ttl": "0s", "path": "/" },
                    }],
                },
            })
        );
    }
}
