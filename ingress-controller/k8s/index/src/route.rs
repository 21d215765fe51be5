use ingress_controller_core::{
    dag::{HeaderMatch, HeaderMatchKind, RouteMatch},
    timeout, RouteTimeouts, Setting,
};
use ingress_controller_k8s_api::http_proxy as api;

/// Reasons a declared route is left out of the routing graph. Only the route
/// is dropped; the rest of its proxy is unaffected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route has no services")]
    NoServices,

    #[error("service {name} has no port {port}")]
    UnresolvedService { name: String, port: i32 },

    #[error("invalid port {port} for service {name}")]
    InvalidPort { name: String, port: i32 },

    #[error("service weights sum to more than {}", u32::MAX)]
    WeightOverflow,

    #[error("a condition must set exactly one of prefix or header")]
    AmbiguousCondition,

    #[error("a route may set at most one prefix condition")]
    MultiplePrefixes,

    #[error("prefix {0:?} must begin with '/'")]
    InvalidPrefix(String),

    #[error("header condition on {0:?} must set exactly one operator")]
    InvalidHeaderCondition(String),

    #[error("header conditions on {0:?} can never match together")]
    ContradictoryHeaders(String),

    #[error("invalid {field} timeout: {source}")]
    InvalidTimeout {
        field: &'static str,
        #[source]
        source: timeout::ParseError,
    },
}

pub(crate) fn route_match(conditions: &[api::MatchCondition]) -> Result<RouteMatch, RouteError> {
    let mut prefix = None;
    let mut headers = Vec::new();
    for condition in conditions {
        match (&condition.prefix, &condition.header) {
            (Some(p), None) => {
                if prefix.is_some() {
                    return Err(RouteError::MultiplePrefixes);
                }
                if !p.starts_with('/') {
                    return Err(RouteError::InvalidPrefix(p.clone()));
                }
                prefix = Some(p.clone());
            }
            (None, Some(header)) => headers.push(header_match(header)?),
            _ => return Err(RouteError::AmbiguousCondition),
        }
    }
    check_headers(&headers)?;

    Ok(RouteMatch {
        prefix: prefix.unwrap_or_else(|| "/".to_string()),
        headers,
    })
}

fn header_match(header: &api::HeaderCondition) -> Result<HeaderMatch, RouteError> {
    let invalid = || RouteError::InvalidHeaderCondition(header.name.clone());
    if header.name.is_empty() {
        return Err(invalid());
    }

    let mut kinds = Vec::with_capacity(1);
    if header.present == Some(true) {
        kinds.push(HeaderMatchKind::Present);
    }
    if let Some(v) = &header.exact {
        kinds.push(HeaderMatchKind::Exact(v.clone()));
    }
    if let Some(v) = &header.not_exact {
        kinds.push(HeaderMatchKind::NotExact(v.clone()));
    }
    if let Some(v) = &header.contains {
        kinds.push(HeaderMatchKind::Contains(v.clone()));
    }
    if let Some(v) = &header.not_contains {
        kinds.push(HeaderMatchKind::NotContains(v.clone()));
    }

    match kinds.pop() {
        Some(kind) if kinds.is_empty() => Ok(HeaderMatch {
            name: header.name.clone(),
            kind,
        }),
        _ => Err(invalid()),
    }
}

/// Rejects sets of header conditions that no request could satisfy.
fn check_headers(headers: &[HeaderMatch]) -> Result<(), RouteError> {
    use HeaderMatchKind::*;

    for (i, a) in headers.iter().enumerate() {
        for b in &headers[i + 1..] {
            if !a.name.eq_ignore_ascii_case(&b.name) {
                continue;
            }
            let contradicts = match (&a.kind, &b.kind) {
                (Exact(x), Exact(y)) => x != y,
                (Exact(x), NotExact(y)) | (NotExact(y), Exact(x)) => x == y,
                (Contains(x), NotContains(y)) | (NotContains(y), Contains(x)) => {
                    x.contains(y.as_str())
                }
                (Exact(x), Contains(y)) | (Contains(y), Exact(x)) => !x.contains(y.as_str()),
                (Exact(x), NotContains(y)) | (NotContains(y), Exact(x)) => x.contains(y.as_str()),
                _ => false,
            };
            if contradicts {
                return Err(RouteError::ContradictoryHeaders(a.name.clone()));
            }
        }
    }
    Ok(())
}

pub(crate) fn timeouts(policy: Option<&api::TimeoutPolicy>) -> Result<RouteTimeouts, RouteError> {
    let Some(policy) = policy else {
        return Ok(RouteTimeouts::default());
    };
    Ok(RouteTimeouts {
        response: setting("response", policy.response.as_deref())?,
        idle: setting("idle", policy.idle.as_deref())?,
    })
}

fn setting(field: &'static str, value: Option<&str>) -> Result<Setting, RouteError> {
    value
        .map(str::parse::<Setting>)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(|source| RouteError::InvalidTimeout { field, source })
}
