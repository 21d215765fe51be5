use std::{fmt, str::FromStr};

/// How a cluster distributes requests over its endpoints.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoadBalancerStrategy {
    #[default]
    RoundRobin,
    WeightedLeastRequest,
    Random,

    /// Consistent hashing on a cookie, pinning a client to the cluster it was
    /// first routed to.
    SessionAffinityCookie,
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[error("unknown load balancer strategy: {0:?}")]
pub struct UnknownStrategy(pub String);

impl LoadBalancerStrategy {
    /// Resolves a declared strategy. Absent and unrecognized strategies both
    /// resolve to round robin.
    pub fn resolve(declared: Option<&str>) -> Self {
        declared
            .and_then(|strategy| strategy.parse().ok())
            .unwrap_or_default()
    }

    /// The name that identifies this strategy in cluster-scoped policy
    /// digests. Round robin is the implicit default and contributes nothing.
    pub fn policy_name(&self) -> &'static str {
        match self {
            Self::RoundRobin => "",
            Self::WeightedLeastRequest => "WeightedLeastRequest",
            Self::Random => "Random",
            Self::SessionAffinityCookie => "Cookie",
        }
    }

    #[inline]
    pub fn has_session_affinity(&self) -> bool {
        matches!(self, Self::SessionAffinityCookie)
    }
}

impl FromStr for LoadBalancerStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RoundRobin" => Ok(Self::RoundRobin),
            "WeightedLeastRequest" => Ok(Self::WeightedLeastRequest),
            "Random" => Ok(Self::Random),
            "Cookie" => Ok(Self::SessionAffinityCookie),
            s => Err(UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for LoadBalancerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundRobin => f.write_str("RoundRobin"),
            strategy => f.write_str(strategy.policy_name()),
        }
    }
}
