use crate::{
    index::ResourceId,
    route::{self, RouteError},
    service::{self, EndpointSliceInfo, ServiceInfo},
};
use ingress_controller_core::{
    dag::{Cluster, Route, RouteAction, Upstream, VirtualHost, WeightedCluster},
    ClusterId, ClusterPolicy, Dag, LoadBalancerStrategy,
};
use ingress_controller_k8s_api::http_proxy as api;
use std::{
    collections::{BTreeMap, BTreeSet},
    net::SocketAddr,
};

/// Builds a routing graph from a complete set of configuration objects.
pub(crate) struct Builder<'a> {
    pub services: &'a BTreeMap<ResourceId, ServiceInfo>,
    pub endpoint_slices: &'a BTreeMap<ResourceId, EndpointSliceInfo>,
    pub proxies: &'a BTreeMap<ResourceId, api::HttpProxySpec>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct BuildStats {
    pub dropped_routes: usize,
    pub rejected_proxies: usize,
}

impl Builder<'_> {
    pub(crate) fn build(&self) -> (Dag, BuildStats) {
        let mut stats = BuildStats::default();

        // Group root proxies by the fqdn they claim.
        let mut roots = BTreeMap::<&str, Vec<&ResourceId>>::new();
        for (id, spec) in self.proxies {
            let Some(vhost) = &spec.virtualhost else {
                tracing::debug!(
                    namespace = %id.namespace,
                    name = %id.name,
                    "HTTPProxy has no virtualhost"
                );
                continue;
            };
            if vhost.fqdn.is_empty() {
                tracing::warn!(
                    namespace = %id.namespace,
                    name = %id.name,
                    "HTTPProxy has an empty fqdn"
                );
                stats.rejected_proxies += 1;
                continue;
            }
            roots.entry(vhost.fqdn.as_str()).or_default().push(id);
        }

        let mut dag = Dag::default();
        for (fqdn, ids) in roots {
            let id = match ids.as_slice() {
                [id] => *id,
                ids => {
                    tracing::warn!(
                        %fqdn,
                        proxies = ?ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                        "fqdn is claimed by more than one HTTPProxy"
                    );
                    stats.rejected_proxies += ids.len();
                    continue;
                }
            };

            let mut routes = Vec::new();
            for (idx, decl) in self.proxies[id].routes.iter().enumerate() {
                match self.route(&id.namespace, decl) {
                    Ok((route, clusters)) => {
                        for cluster in clusters {
                            dag.clusters.entry(cluster.id.clone()).or_insert(cluster);
                        }
                        routes.push(route);
                    }
                    Err(error) => {
                        tracing::warn!(
                            %error,
                            namespace = %id.namespace,
                            name = %id.name,
                            route = idx,
                            "dropping route"
                        );
                        stats.dropped_routes += 1;
                    }
                }
            }

            if routes.is_empty() {
                tracing::debug!(%fqdn, "virtual host has no valid routes");
                continue;
            }
            // The sort is stable, so declaration order breaks ties.
            routes.sort_by(|a, b| a.matches.cmp_specificity(&b.matches));
            dag.virtual_hosts.push(VirtualHost {
                fqdn: fqdn.to_string(),
                routes,
            });
        }

        (dag, stats)
    }

    fn route(&self, ns: &str, decl: &api::Route) -> Result<(Route, Vec<Cluster>), RouteError> {
        let matches = route::route_match(&decl.conditions)?;
        let timeouts = route::timeouts(decl.timeout_policy.as_ref())?;

        let load_balancer = LoadBalancerStrategy::resolve(
            decl.load_balancer_policy
                .as_ref()
                .and_then(|lb| lb.strategy.as_deref()),
        );
        let policy = ClusterPolicy { load_balancer };

        let mut weights = decl
            .services
            .iter()
            .map(|svc| svc.weight.unwrap_or(1))
            .collect::<Vec<_>>();
        if weights.iter().all(|w| *w == 0) {
            weights.fill(1);
        }
        // The data plane requires an exact `total_weight`.
        weights
            .iter()
            .try_fold(0u32, |sum, w| sum.checked_add(*w))
            .ok_or(RouteError::WeightOverflow)?;

        let clusters = decl
            .services
            .iter()
            .map(|svc| self.cluster(ns, svc, policy))
            .collect::<Result<Vec<_>, _>>()?;
        let backends = clusters
            .iter()
            .zip(weights)
            .map(|(cluster, weight)| WeightedCluster {
                cluster: cluster.id.clone(),
                weight,
            })
            .collect();
        let action = RouteAction::from_backends(backends).ok_or(RouteError::NoServices)?;

        let route = Route {
            matches,
            action,
            session_affinity: load_balancer.has_session_affinity(),
            timeouts,
        };
        Ok((route, clusters))
    }

    fn cluster(
        &self,
        ns: &str,
        backend: &api::Service,
        policy: ClusterPolicy,
    ) -> Result<Cluster, RouteError> {
        let port = service::to_port(backend.port).ok_or_else(|| RouteError::InvalidPort {
            name: backend.name.clone(),
            port: backend.port,
        })?;
        let svc_port = self
            .services
            .get(&ResourceId::new(ns.to_string(), backend.name.clone()))
            .and_then(|svc| svc.port(port))
            .ok_or_else(|| RouteError::UnresolvedService {
                name: backend.name.clone(),
                port: backend.port,
            })?;

        let upstream = Upstream {
            namespace: ns.to_string(),
            name: backend.name.clone(),
            port,
            port_name: svc_port.name.clone(),
            endpoints: self.endpoints(ns, &backend.name, svc_port.name.as_deref()),
        };
        Ok(Cluster {
            id: ClusterId::new(ns, &backend.name, port, &policy),
            upstream,
            policy,
        })
    }

    fn endpoints(&self, ns: &str, service: &str, port_name: Option<&str>) -> Vec<SocketAddr> {
        let mut endpoints = BTreeSet::new();
        for (id, slice) in self.endpoint_slices {
            if id.namespace != ns || slice.service.as_deref() != Some(service) {
                continue;
            }
            let Some(port) = slice.port_for(port_name) else {
                continue;
            };
            endpoints.extend(
                slice
                    .addresses
                    .iter()
                    .map(|ip| SocketAddr::new(*ip, port.get())),
            );
        }
        endpoints.into_iter().collect()
    }
}
