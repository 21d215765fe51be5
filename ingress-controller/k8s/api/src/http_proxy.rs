use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Routes requests for a virtual host to backend services.
///
/// Only proxies that declare a `virtualhost` are roots of the routing graph;
/// each root owns the routes for its fqdn.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "ingress.k8s.io",
    version = "v1",
    kind = "HTTPProxy",
    root = "HttpProxy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HttpProxySpec {
    pub virtualhost: Option<VirtualHost>,

    /// Routes in declaration order. Declaration order only breaks ties between
    /// equally specific routes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct VirtualHost {
    pub fqdn: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Conditions that must all match. No prefix condition means `/`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<MatchCondition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,

    pub load_balancer_policy: Option<LoadBalancerPolicy>,

    pub timeout_policy: Option<TimeoutPolicy>,
}

/// Exactly one of `prefix` or `header` must be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct MatchCondition {
    pub prefix: Option<String>,
    pub header: Option<HeaderCondition>,
}

/// Exactly one operator must be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct HeaderCondition {
    pub name: String,
    pub present: Option<bool>,
    pub contains: Option<String>,
    #[serde(rename = "notcontains")]
    pub not_contains: Option<String>,
    pub exact: Option<String>,
    #[serde(rename = "notexact")]
    pub not_exact: Option<String>,
}

/// A backend reference: a port of a `Service` in the proxy's namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Service {
    pub name: String,
    pub port: i32,

    /// Share of the route's traffic. Defaults to 1.
    pub weight: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct LoadBalancerPolicy {
    /// One of `RoundRobin`, `WeightedLeastRequest`, `Random` or `Cookie`.
    pub strategy: Option<String>,
}

/// Timeouts use Go duration syntax; `infinity` disables the timeout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct TimeoutPolicy {
    pub response: Option<String>,
    pub idle: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_spec() {
        let spec: HttpProxySpec = serde_json::from_value(serde_json::json!({
            "virtualhost": { "fqdn": "www.example.com" },
            "routes": [{
                "conditions": [
                    { "prefix": "/cart" },
                    { "header": { "name": "x-canary", "notexact": "false" } }
                ],
                "loadBalancerPolicy": { "strategy": "Cookie" },
                "timeoutPolicy": { "response": "1s" },
                "services": [
                    { "name": "app", "port": 80 },
                    { "name": "app", "port": 8080, "weight": 10 }
                ]
            }]
        }))
        .unwrap();

        assert_eq!(
            spec.virtualhost,
            Some(VirtualHost {
                fqdn: "www.example.com".to_string()
            })
        );
        let route = &spec.routes[0];
        assert_eq!(route.conditions.len(), 2);
        assert_eq!(
            route.conditions[1].header.as_ref().unwrap().not_exact.as_deref(),
            Some("false")
        );
        assert_eq!(
            route.load_balancer_policy.as_ref().unwrap().strategy.as_deref(),
            Some("Cookie")
        );
        assert_eq!(route.services[1].weight, Some(10));
        assert_eq!(route.services[0].weight, None);
    }
}
