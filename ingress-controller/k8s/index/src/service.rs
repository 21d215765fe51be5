use ingress_controller_k8s_api::{self as k8s, ResourceExt};
use std::{collections::BTreeSet, net::IpAddr, num::NonZeroU16};

/// The routable ports of a `Service`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ServiceInfo {
    pub ports: Vec<ServicePort>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ServicePort {
    pub name: Option<String>,
    pub port: NonZeroU16,
}

/// The ready addresses carried by an `EndpointSlice`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct EndpointSliceInfo {
    /// The name of the `Service` that owns this slice, if labeled.
    pub service: Option<String>,
    pub ports: Vec<SlicePort>,
    pub addresses: BTreeSet<IpAddr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SlicePort {
    pub name: Option<String>,
    pub port: NonZeroU16,
}

// === impl ServiceInfo ===

impl ServiceInfo {
    pub(crate) fn from_resource(svc: &k8s::Service) -> Self {
        let ports = svc
            .spec
            .iter()
            .flat_map(|spec| spec.ports.iter().flatten())
            .filter_map(|sp| {
                let Some(port) = to_port(sp.port) else {
                    tracing::warn!(
                        service = %svc.name_any(),
                        port = sp.port,
                        "ignoring invalid service port"
                    );
                    return None;
                };
                Some(ServicePort {
                    name: non_empty(sp.name.as_deref()),
                    port,
                })
            })
            .collect();
        Self { ports }
    }

    pub(crate) fn port(&self, port: NonZeroU16) -> Option<&ServicePort> {
        self.ports.iter().find(|sp| sp.port == port)
    }
}

// === impl EndpointSliceInfo ===

impl EndpointSliceInfo {
    pub(crate) fn from_resource(slice: &k8s::EndpointSlice) -> Self {
        let service = slice.labels().get(k8s::SERVICE_NAME_LABEL).cloned();

        let ports = slice
            .ports
            .iter()
            .flatten()
            .filter_map(|ep| {
                let port = ep.port.and_then(to_port)?;
                Some(SlicePort {
                    name: non_empty(ep.name.as_deref()),
                    port,
                })
            })
            .collect();

        let addresses = slice
            .endpoints
            .iter()
            .filter(|ep| is_ready(ep))
            .flat_map(|ep| ep.addresses.iter())
            .filter_map(|addr| match addr.parse::<IpAddr>() {
                Ok(ip) => Some(ip),
                Err(error) => {
                    tracing::warn!(
                        slice = %slice.name_any(),
                        %addr,
                        %error,
                        "ignoring invalid endpoint address"
                    );
                    None
                }
            })
            .collect();

        Self {
            service,
            ports,
            addresses,
        }
    }

    /// Finds the slice port that serves the named service port. Unnamed
    /// service ports match unnamed slice ports.
    pub(crate) fn port_for(&self, name: Option<&str>) -> Option<NonZeroU16> {
        self.ports
            .iter()
            .find(|sp| sp.name.as_deref() == name)
            .map(|sp| sp.port)
    }
}

/// Endpoints without a ready condition are considered ready.
fn is_ready(ep: &k8s::Endpoint) -> bool {
    ep.conditions
        .as_ref()
        .and_then(|c| c.ready)
        .unwrap_or(true)
}

pub(crate) fn to_port(port: i32) -> Option<NonZeroU16> {
    u16::try_from(port).ok().and_then(NonZeroU16::new)
}

fn non_empty(name: Option<&str>) -> Option<String> {
    name.filter(|n| !n.is_empty()).map(ToString::to_string)
}
