use crate::logger::*;
use serde::Deserialize;
use std::time::Duration;

pub const IPIFY_URL: &str = "https://api.ipify.org?format=json";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct IpifyResponse {
    ip: String,
}

/// Best-effort public IP discovery. The endpoint falls back to proxy headers when this
/// yields nothing, so every failure maps to `None`.
#[derive(Debug, Clone)]
pub struct IpLookup {
    http: reqwest::Client,
    url: String,
}

impl IpLookup {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_url(IPIFY_URL)
    }

    pub fn with_url(url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub async fn public_ip(&self) -> Option<String> {
        let response = match self.http.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%e, "could not get public ip");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "could not get public ip");
            return None;
        }
        match response.json::<IpifyResponse>().await {
            Ok(body) if !body.ip.trim().is_empty() => Some(body.ip),
            Ok(_) => None,
            Err(e) => {
                warn!(%e, "unexpected ip lookup body");
                None
            }
        }
    }
}
