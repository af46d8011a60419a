use crate::domain_model::{ActionLabel, ClientKey, VerificationResult};

#[derive(Debug, Clone)]
pub struct VerifyInput {
    pub token: Option<String>,
    pub action: ActionLabel,
    pub client_key: ClientKey,
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationServiceError {
    #[error("Captcha token is required")]
    MissingToken,
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Rate-limited token verification, independent of the HTTP layer.
#[async_trait::async_trait]
pub trait VerificationService: Send + Sync {
    async fn verify(&self, input: VerifyInput) -> Result<VerificationResult, VerificationServiceError>;
}
