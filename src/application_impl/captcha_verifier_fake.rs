use crate::application_port::CaptchaVerifier;
use crate::domain_model::{VerificationErrorKind, VerificationResult};

/// Response token hCaptcha documents for its test site key.
pub const FAKE_PASSING_TOKEN: &str = "10000000-aaaa-bbbb-cccc-000000000001";

#[derive(Debug)]
pub struct FakeCaptchaVerifier;

impl FakeCaptchaVerifier {
    pub fn new() -> Self {
        Self
    }
}

// Fixed answers for local development without reaching hCaptcha.
#[async_trait::async_trait]
impl CaptchaVerifier for FakeCaptchaVerifier {
    async fn verify(&self, token: &str, _client_ip: Option<&str>) -> VerificationResult {
        match token.trim() {
            FAKE_PASSING_TOKEN | "pass" => VerificationResult::verified(),
            "expired" => VerificationResult::failed(VerificationErrorKind::ExpiredOrReused),
            "unavailable" => VerificationResult::failed(VerificationErrorKind::ServiceUnavailable),
            _ => VerificationResult::failed(VerificationErrorKind::InvalidToken),
        }
    }
}
