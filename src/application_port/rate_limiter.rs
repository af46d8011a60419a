use crate::domain_model::ClientKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// `None` when the limiter could not consult its store and let the call through.
    pub remaining_attempts: Option<u32>,
}

impl RateLimitDecision {
    pub fn allowed(remaining_attempts: u32) -> Self {
        RateLimitDecision {
            allowed: true,
            remaining_attempts: Some(remaining_attempts),
        }
    }

    pub fn denied() -> Self {
        RateLimitDecision {
            allowed: false,
            remaining_attempts: Some(0),
        }
    }

    pub fn fail_open() -> Self {
        RateLimitDecision {
            allowed: true,
            remaining_attempts: None,
        }
    }
}

/// Admission check run once per verification request. Every admitted call spends
/// one attempt whether or not the token later verifies.
#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &ClientKey) -> RateLimitDecision;
}
