use crate::application_port::CaptchaVerifier;
use crate::domain_model::{VerificationErrorKind, VerificationResult};
use crate::logger::*;
use serde::Deserialize;
use std::time::Duration;

pub const HCAPTCHA_VERIFY_URL: &str = "https://hcaptcha.com/siteverify";

#[derive(Debug, Clone)]
pub struct HCaptchaConfig {
    pub verify_url: String,
    pub secret: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

pub struct HCaptchaVerifier {
    http: reqwest::Client,
    verify_url: String,
    secret: String,
}

impl HCaptchaVerifier {
    pub fn new(config: HCaptchaConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            verify_url: config.verify_url,
            secret: config.secret,
        })
    }
}

#[async_trait::async_trait]
impl CaptchaVerifier for HCaptchaVerifier {
    async fn verify(&self, token: &str, client_ip: Option<&str>) -> VerificationResult {
        if token.trim().is_empty() {
            return VerificationResult::failed(VerificationErrorKind::InvalidToken);
        }
        if self.secret.is_empty() {
            error!("hCaptcha secret key is not configured");
            return VerificationResult::failed(VerificationErrorKind::BadSecretConfig);
        }

        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = client_ip {
            form.push(("remoteip", ip));
        }

        debug!(token_len = token.len(), "sending verification request");
        let response = match self.http.post(&self.verify_url).form(&form).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("hCaptcha request failed: {}", e);
                return VerificationResult::failed(VerificationErrorKind::ServiceUnavailable);
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "hCaptcha API responded with an error status");
            return VerificationResult::failed(VerificationErrorKind::ServiceUnavailable);
        }

        let body: SiteVerifyResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("unreadable hCaptcha response: {}", e);
                return VerificationResult::failed(VerificationErrorKind::ServiceUnavailable);
            }
        };

        if body.success {
            VerificationResult::verified()
        } else {
            warn!(error_codes = ?body.error_codes, "hCaptcha rejected token");
            VerificationResult::failed(VerificationErrorKind::from_error_codes(&body.error_codes))
        }
    }
}
