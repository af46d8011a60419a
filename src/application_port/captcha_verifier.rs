use crate::domain_model::VerificationResult;

/// Asks the external verification service whether a widget token is genuine.
/// Implementations never fail: transport problems come back as
/// `VerificationErrorKind::ServiceUnavailable`.
#[async_trait::async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn verify(&self, token: &str, client_ip: Option<&str>) -> VerificationResult;
}
