#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod http_proxy;

pub use self::http_proxy::{HttpProxy, HttpProxySpec};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Service, ServicePort, ServiceSpec},
        discovery::v1::{Endpoint, EndpointConditions, EndpointPort, EndpointSlice},
    },
    apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString},
};
pub use kube::{Resource, ResourceExt};

/// Associates an `EndpointSlice` with the `Service` it was generated for.
pub const SERVICE_NAME_LABEL: &str = "kubernetes.io/service-name";
