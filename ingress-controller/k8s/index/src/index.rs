use crate::{
    builder::Builder,
    metrics::IndexMetrics,
    service::{EndpointSliceInfo, ServiceInfo},
};
use ingress_controller_core::{Dag, Observer};
use ingress_controller_k8s_api::{self as k8s, Resource, ResourceExt};
use parking_lot::RwLock;
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Holds every configuration object the routing graph is built from, and the
/// graph built from the current set.
pub struct Index {
    services: BTreeMap<ResourceId, ServiceInfo>,
    endpoint_slices: BTreeMap<ResourceId, EndpointSliceInfo>,
    proxies: BTreeMap<ResourceId, k8s::HttpProxySpec>,

    dag: Dag,
    observer: Box<dyn Observer + Send + Sync>,
    metrics: IndexMetrics,
}

pub type SharedIndex = Arc<RwLock<Index>>;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

/// A configuration object that contributes to the routing graph.
#[derive(Clone, Debug)]
pub enum ConfigurationObject {
    Service(k8s::Service),
    EndpointSlice(k8s::EndpointSlice),
    HttpProxy(k8s::HttpProxy),
}

// === impl Index ===

impl Index {
    pub fn new(observer: impl Observer + Send + Sync + 'static, metrics: IndexMetrics) -> Self {
        Self {
            services: BTreeMap::new(),
            endpoint_slices: BTreeMap::new(),
            proxies: BTreeMap::new(),
            dag: Dag::default(),
            observer: Box::new(observer),
            metrics,
        }
    }

    pub fn shared(
        observer: impl Observer + Send + Sync + 'static,
        metrics: IndexMetrics,
    ) -> SharedIndex {
        Arc::new(RwLock::new(Self::new(observer, metrics)))
    }

    /// The graph built from the current set of objects.
    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    pub fn on_add(&mut self, obj: ConfigurationObject) {
        if self.insert(obj) {
            self.rebuild();
        }
    }

    /// Replaces `old` with `new`. The two may name different objects, in which
    /// case `old` is removed.
    pub fn on_update(&mut self, old: ConfigurationObject, new: ConfigurationObject) {
        let mut changed = false;
        if old.kind() != new.kind() || old.id() != new.id() {
            changed = self.remove(&old);
        }
        changed |= self.insert(new);
        if changed {
            self.rebuild();
        }
    }

    pub fn on_delete(&mut self, obj: ConfigurationObject) {
        if self.remove(&obj) {
            self.rebuild();
        }
    }

    /// Upserts an object, returning false if it could not be indexed.
    fn insert(&mut self, obj: ConfigurationObject) -> bool {
        let Some(id) = obj.id() else {
            tracing::warn!(
                kind = obj.kind(),
                "ignoring object without a namespace and name"
            );
            return false;
        };
        tracing::debug!(
            kind = obj.kind(),
            namespace = %id.namespace,
            name = %id.name,
            "indexing"
        );
        match obj {
            ConfigurationObject::Service(svc) => {
                self.services.insert(id, ServiceInfo::from_resource(&svc));
            }
            ConfigurationObject::EndpointSlice(slice) => {
                self.endpoint_slices
                    .insert(id, EndpointSliceInfo::from_resource(&slice));
            }
            ConfigurationObject::HttpProxy(proxy) => {
                self.proxies.insert(id, proxy.spec);
            }
        }
        true
    }

    fn remove(&mut self, obj: &ConfigurationObject) -> bool {
        match obj.id() {
            Some(id) => self.remove_id(obj.kind(), &id),
            None => false,
        }
    }

    fn remove_id(&mut self, kind: &'static str, id: &ResourceId) -> bool {
        tracing::debug!(kind, namespace = %id.namespace, name = %id.name, "removing");
        match kind {
            SERVICE => self.services.remove(id).is_some(),
            ENDPOINT_SLICE => self.endpoint_slices.remove(id).is_some(),
            _ => self.proxies.remove(id).is_some(),
        }
    }

    fn rebuild(&mut self) {
        let (dag, stats) = Builder {
            services: &self.services,
            endpoint_slices: &self.endpoint_slices,
            proxies: &self.proxies,
        }
        .build();

        tracing::debug!(
            virtual_hosts = dag.virtual_hosts.len(),
            clusters = dag.clusters.len(),
            dropped_routes = stats.dropped_routes,
            rejected_proxies = stats.rejected_proxies,
            "rebuilt routing graph"
        );
        self.metrics.record_rebuild(
            dag.virtual_hosts.len(),
            dag.clusters.len(),
            stats.dropped_routes,
            stats.rejected_proxies,
        );
        self.observer.on_change(&dag);
        self.dag = dag;
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("services", &self.services)
            .field("endpoint_slices", &self.endpoint_slices)
            .field("proxies", &self.proxies)
            .field("dag", &self.dag)
            .finish_non_exhaustive()
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Service> for Index {
    fn apply(&mut self, svc: k8s::Service) {
        self.on_add(ConfigurationObject::Service(svc))
    }

    fn delete(&mut self, namespace: String, name: String) {
        if self.remove_id(SERVICE, &ResourceId::new(namespace, name)) {
            self.rebuild();
        }
    }
}

impl kubert::index::IndexNamespacedResource<k8s::EndpointSlice> for Index {
    fn apply(&mut self, slice: k8s::EndpointSlice) {
        self.on_add(ConfigurationObject::EndpointSlice(slice))
    }

    fn delete(&mut self, namespace: String, name: String) {
        if self.remove_id(ENDPOINT_SLICE, &ResourceId::new(namespace, name)) {
            self.rebuild();
        }
    }
}

impl kubert::index::IndexNamespacedResource<k8s::HttpProxy> for Index {
    fn apply(&mut self, proxy: k8s::HttpProxy) {
        self.on_add(ConfigurationObject::HttpProxy(proxy))
    }

    fn delete(&mut self, namespace: String, name: String) {
        if self.remove_id(HTTP_PROXY, &ResourceId::new(namespace, name)) {
            self.rebuild();
        }
    }
}

// === impl ResourceId ===

impl ResourceId {
    pub fn new(namespace: String, name: String) -> Self {
        Self { namespace, name }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl ConfigurationObject ===

const SERVICE: &str = "Service";
const ENDPOINT_SLICE: &str = "EndpointSlice";
const HTTP_PROXY: &str = "HTTPProxy";

impl ConfigurationObject {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Service(_) => SERVICE,
            Self::EndpointSlice(_) => ENDPOINT_SLICE,
            Self::HttpProxy(_) => HTTP_PROXY,
        }
    }

    pub fn id(&self) -> Option<ResourceId> {
        let (namespace, name) = match self {
            Self::Service(o) => (o.namespace(), o.meta().name.clone()),
            Self::EndpointSlice(o) => (o.namespace(), o.meta().name.clone()),
            Self::HttpProxy(o) => (o.namespace(), o.meta().name.clone()),
        };
        Some(ResourceId::new(namespace?, name?))
    }
}

impl From<k8s::Service> for ConfigurationObject {
    fn from(svc: k8s::Service) -> Self {
        Self::Service(svc)
    }
}

impl From<k8s::EndpointSlice> for ConfigurationObject {
    fn from(slice: k8s::EndpointSlice) -> Self {
        Self::EndpointSlice(slice)
    }
}

impl From<k8s::HttpProxy> for ConfigurationObject {
    fn from(proxy: k8s::HttpProxy) -> Self {
        Self::HttpProxy(proxy)
    }
}
