use crate::api::v1::{VerifyCaptchaRequest, VerifyCaptchaResponse};
use crate::client::IpLookup;
use crate::domain_model::ActionLabel;
use crate::logger::*;
use reqwest::StatusCode;
use std::time::Duration;

const SERVICE_UNAVAILABLE: &str = "Verification service unavailable";
const NETWORK_ERROR: &str = "Network error during verification";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointOutcome {
    Verified {
        remaining_attempts: Option<u32>,
    },
    Rejected {
        message: String,
        remaining_attempts: Option<u32>,
    },
    RateLimited {
        message: String,
    },
    Unavailable {
        message: String,
    },
}

/// Server-side check of a widget token for one protected action.
#[async_trait::async_trait]
pub trait VerifyEndpoint: Send + Sync {
    async fn verify(&self, token: &str, action: &ActionLabel) -> EndpointOutcome;
}

pub struct HttpVerifyEndpoint {
    http: reqwest::Client,
    url: String,
    ip_lookup: Option<IpLookup>,
}

impl HttpVerifyEndpoint {
    /// `url` is the full address of `POST /verify-captcha`.
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.into(),
            ip_lookup: None,
        })
    }

    pub fn with_ip_lookup(mut self, ip_lookup: IpLookup) -> Self {
        self.ip_lookup = Some(ip_lookup);
        self
    }
}

#[async_trait::async_trait]
impl VerifyEndpoint for HttpVerifyEndpoint {
    async fn verify(&self, token: &str, action: &ActionLabel) -> EndpointOutcome {
        let token = token.trim();
        if token.is_empty() {
            return EndpointOutcome::Rejected {
                message: "Invalid captcha token".to_string(),
                remaining_attempts: None,
            };
        }

        let user_ip = match &self.ip_lookup {
            Some(lookup) => lookup.public_ip().await,
            None => None,
        };
        debug!(%action, has_ip = user_ip.is_some(), "submitting captcha token");

        let request = VerifyCaptchaRequest {
            token: Some(token.to_string()),
            action: Some(action.as_str().to_string()),
            user_ip,
        };

        let response = match self.http.post(&self.url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%e, "verification request failed");
                return EndpointOutcome::Unavailable {
                    message: NETWORK_ERROR.to_string(),
                };
            }
        };

        let status = response.status();
        let body = match response.json::<VerifyCaptchaResponse>().await {
            Ok(body) => body,
            Err(e) => {
                warn!(%status, %e, "unreadable verification response");
                return EndpointOutcome::Unavailable {
                    message: SERVICE_UNAVAILABLE.to_string(),
                };
            }
        };

        interpret(status, body)
    }
}

fn interpret(status: StatusCode, body: VerifyCaptchaResponse) -> EndpointOutcome {
    if status.is_success() && body.is_success() {
        return EndpointOutcome::Verified {
            remaining_attempts: body.remaining_attempts,
        };
    }

    let message = body
        .error
        .unwrap_or_else(|| "Verification failed".to_string());

    if status == StatusCode::TOO_MANY_REQUESTS || body.rate_limited == Some(true) {
        return EndpointOutcome::RateLimited { message };
    }

    if status == StatusCode::BAD_REQUEST || status.is_success() {
        return EndpointOutcome::Rejected {
            message,
            remaining_attempts: body.remaining_attempts,
        };
    }

    warn!(%status, %message, "verification service error");
    EndpointOutcome::Unavailable {
        message: SERVICE_UNAVAILABLE.to_string(),
    }
}
