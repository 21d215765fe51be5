use crate::LoadBalancerStrategy;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::{fmt, num::NonZeroU16};

/// The longest name generated for a proxy object.
pub const MAX_NAME_LEN: usize = 60;

/// Identifies a backend cluster: `{namespace}/{service}/{port}/{policy digest}`.
///
/// The id is a pure function of its inputs, so the same service port with the
/// same cluster-scoped policy names the same cluster across rebuilds and across
/// restarts. Route-level attributes such as weights never contribute to it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(String);

/// The policy attributes that are scoped to a cluster rather than to a route.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClusterPolicy {
    pub load_balancer: LoadBalancerStrategy,
}

// === impl ClusterId ===

impl ClusterId {
    pub fn new(namespace: &str, service: &str, port: NonZeroU16, policy: &ClusterPolicy) -> Self {
        let port = port.to_string();
        let digest = policy.digest();
        Self(hashname(
            MAX_NAME_LEN,
            &[namespace, service, port.as_str(), digest.as_str()],
        ))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClusterId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// === impl ClusterPolicy ===

impl ClusterPolicy {
    /// Returns a 10 hex character digest over every cluster-scoped attribute.
    pub fn digest(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.load_balancer.policy_name().as_bytes());
        hex::encode(&hasher.finalize()[..5])
    }
}

/// Joins `parts` with `/`, shortening them when the result would not be
/// shorter than `limit`.
///
/// Parts are shortened from last to first. Each shortened part keeps its
/// leading characters and ends with a short hash of the full joined name, so
/// distinct long names remain distinct. When shortening every part is not
/// enough, the name is the hash of the full joined name cut to `limit`.
///
/// Lengths are measured in bytes.
pub fn hashname(limit: usize, parts: &[&str]) -> String {
    const SHORT_HASH: usize = 6;

    let joined = parts.join("/");
    if joined.len() < limit || parts.is_empty() {
        return joined;
    }

    let hash = hex::encode(Sha256::digest(joined.as_bytes()));
    let each = limit / parts.len();

    let mut parts = parts.iter().map(|p| p.to_string()).collect::<Vec<_>>();
    for i in (0..parts.len()).rev() {
        parts[i] = truncate(each, &parts[i], &hash[..SHORT_HASH]);
        let joined = parts.join("/");
        if joined.len() < limit {
            return joined;
        }
    }

    head(&hash, limit).to_string()
}

fn truncate(limit: usize, s: &str, suffix: &str) -> String {
    if limit >= s.len() {
        return s.to_string();
    }
    if limit > suffix.len() {
        return format!("{}{suffix}", head(s, limit - suffix.len()));
    }
    head(s, limit).to_string()
}

/// The longest prefix of `s` that is at most `n` bytes.
fn head(s: &str, n: usize) -> &str {
    if n >= s.len() {
        return s;
    }
    let mut end = n;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
