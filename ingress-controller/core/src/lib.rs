#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cluster;
pub mod dag;
pub mod load_balancer;
pub mod timeout;

pub use self::{
    cluster::{ClusterId, ClusterPolicy},
    dag::{Dag, Observer},
    load_balancer::LoadBalancerStrategy,
    timeout::{RouteTimeouts, Setting, TimeoutPolicy},
};
