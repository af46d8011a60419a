use crate::application_port::*;
use crate::domain_model::VerificationResult;
use crate::logger::*;
use std::sync::Arc;

pub struct RealVerificationService {
    rate_limiter: Arc<dyn RateLimiter>,
    verifier: Arc<dyn CaptchaVerifier>,
}

impl RealVerificationService {
    pub fn new(rate_limiter: Arc<dyn RateLimiter>, verifier: Arc<dyn CaptchaVerifier>) -> Self {
        Self {
            rate_limiter,
            verifier,
        }
    }
}

#[async_trait::async_trait]
impl VerificationService for RealVerificationService {
    async fn verify(&self, input: VerifyInput) -> Result<VerificationResult, VerificationServiceError> {
        // validation failures consume no attempt
        let token = input
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(VerificationServiceError::MissingToken)?;

        info!(
            client_key = %input.client_key,
            action = %input.action,
            "captcha verification attempt"
        );

        let decision = self.rate_limiter.check(&input.client_key).await;
        if !decision.allowed {
            info!(client_key = %input.client_key, "captcha verification rate limited");
            return Ok(VerificationResult::rate_limited());
        }

        let client_ip = Some(input.client_key.as_str()).filter(|_| !input.client_key.is_unknown());
        let result = self
            .verifier
            .verify(token, client_ip)
            .await
            .with_remaining_attempts(decision.remaining_attempts);

        match &result.error_kind {
            None => debug!(client_key = %input.client_key, "captcha verified"),
            Some(kind) => warn!(client_key = %input.client_key, "captcha rejected: {:?}", kind),
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::AttemptRateLimiter;
    use crate::domain_model::*;
    use crate::infra_memory::MemoryAttemptStore;
    use std::sync::Mutex;

    /// Records what it was asked and answers with a fixed result.
    struct ScriptedVerifier {
        answer: VerificationResult,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedVerifier {
        fn new(answer: VerificationResult) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CaptchaVerifier for ScriptedVerifier {
        async fn verify(&self, token: &str, client_ip: Option<&str>) -> VerificationResult {
            self.calls
                .lock()
                .unwrap()
                .push((token.to_string(), client_ip.map(str::to_string)));
            self.answer.clone()
        }
    }

    fn service(verifier: Arc<ScriptedVerifier>) -> (RealVerificationService, Arc<MemoryAttemptStore>) {
        let store = Arc::new(MemoryAttemptStore::new());
        let limiter = Arc::new(AttemptRateLimiter::new(store.clone()));
        (RealVerificationService::new(limiter, verifier), store)
    }

    fn input(token: Option<&str>, key: &str) -> VerifyInput {
        VerifyInput {
            token: token.map(str::to_string),
            action: ActionLabel::CreateProject,
            client_key: ClientKey::from(key),
        }
    }

    #[tokio::test]
    async fn missing_token_consumes_no_attempt() {
        let verifier = ScriptedVerifier::new(VerificationResult::verified());
        let (service, store) = service(verifier.clone());

        for token in [None, Some(""), Some("  ")] {
            let result = service.verify(input(token, "1.2.3.4")).await;
            assert!(matches!(result, Err(VerificationServiceError::MissingToken)));
        }
        assert!(store.is_empty());
        assert!(verifier.calls().is_empty());
    }

    #[tokio::test]
    async fn successive_successes_spend_one_attempt_each() -> anyhow::Result<()> {
        let verifier = ScriptedVerifier::new(VerificationResult::verified());
        let (service, _store) = service(verifier.clone());

        let first = service.verify(input(Some("a"), "1.2.3.4")).await?;
        let second = service.verify(input(Some("b"), "1.2.3.4")).await?;

        assert!(first.success && second.success);
        assert_eq!(first.remaining_attempts, Some(4));
        assert_eq!(second.remaining_attempts, Some(3));
        assert_eq!(
            verifier.calls()[0],
            ("a".to_string(), Some("1.2.3.4".to_string()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn unknown_client_sends_no_remote_ip() -> anyhow::Result<()> {
        let verifier = ScriptedVerifier::new(VerificationResult::verified());
        let (service, _store) = service(verifier.clone());

        service.verify(input(Some(" tok "), "unknown")).await?;
        assert_eq!(verifier.calls(), vec![("tok".to_string(), None)]);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_tokens_still_spend_budget_until_blocked() -> anyhow::Result<()> {
        let verifier =
            ScriptedVerifier::new(VerificationResult::failed(VerificationErrorKind::InvalidToken));
        let (service, _store) = service(verifier.clone());

        for expected in [4, 3, 2, 1, 0] {
            let result = service.verify(input(Some("bad"), "1.2.3.4")).await?;
            assert!(!result.success && !result.rate_limited);
            assert_eq!(result.remaining_attempts, Some(expected));
        }
        let result = service.verify(input(Some("bad"), "1.2.3.4")).await?;
        assert!(result.rate_limited);
        assert_eq!(verifier.calls().len(), 5);
        Ok(())
    }
}
