use crate::{
    core::{Setting, TimeoutPolicy},
    discovery,
    index::{Index, IndexMetrics},
    k8s,
    xds::{DiscoveryServer, ListenerConfig, SnapshotCache, Translator, XdsMetrics},
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "ingress", about = "An HTTP ingress controller")]
pub struct Args {
    #[clap(long, default_value = "ingress_controller=info,warn", env = "INGRESS_CONTROLLER_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Address of the REST-JSON discovery server.
    #[clap(long, default_value = "0.0.0.0:8001")]
    discovery_addr: SocketAddr,

    /// Name of the HTTP listener and its route configuration.
    #[clap(long, default_value = "ingress_http")]
    listener_name: String,

    /// Address the proxy's HTTP listener binds.
    #[clap(long, default_value = "0.0.0.0")]
    listener_address: IpAddr,

    #[clap(long, default_value = "8080")]
    listener_port: u16,

    #[clap(long, default_value = "/dev/stdout")]
    access_log_path: String,

    /// Default idle timeout for downstream connections, e.g. `60s`, or
    /// `infinity` to disable it.
    #[clap(long, env = "INGRESS_CONNECTION_IDLE_TIMEOUT")]
    connection_idle_timeout: Option<Setting>,

    /// Default idle timeout for HTTP streams.
    #[clap(long, env = "INGRESS_STREAM_IDLE_TIMEOUT")]
    stream_idle_timeout: Option<Setting>,

    /// Default maximum lifetime of downstream connections.
    #[clap(long, env = "INGRESS_MAX_CONNECTION_DURATION")]
    max_connection_duration: Option<Setting>,

    /// Default time the proxy waits for connections to drain on shutdown.
    #[clap(long, env = "INGRESS_CONNECTION_SHUTDOWN_GRACE_PERIOD")]
    connection_shutdown_grace_period: Option<Setting>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            discovery_addr,
            listener_name,
            listener_address,
            listener_port,
            access_log_path,
            connection_idle_timeout,
            stream_idle_timeout,
            max_connection_duration,
            connection_shutdown_grace_period,
        } = self;

        let config = ListenerConfig {
            name: listener_name,
            address: listener_address,
            port: listener_port,
            access_log_path,
            timeouts: TimeoutPolicy::default(),
            default_timeouts: TimeoutPolicy {
                connection_idle: connection_idle_timeout.unwrap_or_default(),
                stream_idle: stream_idle_timeout.unwrap_or_default(),
                max_connection_duration: max_connection_duration.unwrap_or_default(),
                connection_shutdown_grace_period: connection_shutdown_grace_period
                    .unwrap_or_default(),
            },
        };

        let mut prom = <Registry>::default();
        let index_metrics = IndexMetrics::register(prom.sub_registry_with_prefix("index"));
        let xds_metrics = XdsMetrics::register(prom.sub_registry_with_prefix("xds"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        // Every change to an indexed object rebuilds the routing graph and
        // publishes new snapshots into the cache.
        let cache = Arc::new(SnapshotCache::new(xds_metrics.clone()));
        let index = Index::shared(Translator::new(config, cache.clone()), index_metrics);

        // Spawn resource watches.

        let services = runtime.watch_all::<k8s::Service>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index.clone(), services).instrument(info_span!("services")),
        );

        let endpoint_slices = runtime.watch_all::<k8s::EndpointSlice>(
            watcher::Config::default().labels(k8s::SERVICE_NAME_LABEL),
        );
        tokio::spawn(
            kubert::index::namespaced(index.clone(), endpoint_slices)
                .instrument(info_span!("endpointslices")),
        );

        let proxies = runtime.watch_all::<k8s::HttpProxy>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index, proxies).instrument(info_span!("httpproxies")),
        );

        // Run the discovery server, serving snapshots from the cache.
        let drain = runtime.shutdown_handle();
        let server = DiscoveryServer::new(cache, drain.clone(), xds_metrics);
        tokio::spawn(discovery::serve(discovery_addr, server, drain));

        // Block the main thread on the shutdown signal. Once it fires, wait for
        // the background tasks to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
