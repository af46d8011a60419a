use serde::{Deserialize, Serialize};
use std::fmt;

const UNKNOWN: &str = "unknown";

/// Longest accepted caller address; matches the `rate_limits.ip` column.
pub const MAX_CLIENT_KEY_LEN: usize = 64;

/// Proxy headers consulted for the caller address, highest priority first.
pub const FORWARDED_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

/// Rate-limit bucket for a caller, normally its IP address.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(pub String);

impl ClientKey {
    pub fn unknown() -> Self {
        ClientKey(UNKNOWN.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Picks the caller address: explicit client-supplied IP first, then the proxy
    /// headers in `FORWARDED_IP_HEADERS` order. `header` looks up a header by its
    /// lowercase name. Values longer than `MAX_CLIENT_KEY_LEN` are skipped.
    pub fn resolve<'a, F>(user_ip: Option<&'a str>, header: F) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        if let Some(ip) = user_ip.map(str::trim).filter(|ip| is_usable(ip)) {
            return ClientKey(ip.to_string());
        }

        FORWARDED_IP_HEADERS
            .iter()
            .filter_map(|name| header(name))
            // x-forwarded-for may carry a chain; the first hop is the client
            .filter_map(|value| value.split(',').next())
            .map(str::trim)
            .find(|ip| is_usable(ip))
            .map(|ip| ClientKey(ip.to_string()))
            .unwrap_or_else(ClientKey::unknown)
    }
}

fn is_usable(ip: &str) -> bool {
    !ip.is_empty() && ip.len() <= MAX_CLIENT_KEY_LEN
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientKey {
    fn from(value: &str) -> Self {
        ClientKey(value.to_string())
    }
}
