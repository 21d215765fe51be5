use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct IndexMetrics {
    rebuilds: Counter,
    dropped_routes: Counter,
    rejected_proxies: Counter,
    virtual_hosts: Gauge,
    clusters: Gauge,
}

impl IndexMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let metrics = Self::default();
        reg.register(
            "rebuilds",
            "Total number of routing graph rebuilds",
            metrics.rebuilds.clone(),
        );
        reg.register(
            "dropped_routes",
            "Total number of routes dropped from rebuilt graphs because they could not be resolved",
            metrics.dropped_routes.clone(),
        );
        reg.register(
            "rejected_proxies",
            "Total number of HTTPProxies excluded from rebuilt graphs because they are invalid or conflict",
            metrics.rejected_proxies.clone(),
        );
        reg.register(
            "virtual_hosts",
            "The number of virtual hosts in the current routing graph",
            metrics.virtual_hosts.clone(),
        );
        reg.register(
            "clusters",
            "The number of clusters in the current routing graph",
            metrics.clusters.clone(),
        );
        metrics
    }

    pub(crate) fn record_rebuild(
        &self,
        virtual_hosts: usize,
        clusters: usize,
        dropped_routes: usize,
        rejected_proxies: usize,
    ) {
        self.rebuilds.inc();
        self.dropped_routes.inc_by(dropped_routes as u64);
        self.rejected_proxies.inc_by(rejected_proxies as u64);
        self.virtual_hosts.set(virtual_hosts as i64);
        self.clusters.set(clusters as i64);
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.get()
    }

    pub fn dropped_routes(&self) -> u64 {
        self.dropped_routes.get()
    }

    pub fn rejected_proxies(&self) -> u64 {
        self.rejected_proxies.get()
    }
}
