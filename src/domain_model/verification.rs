use std::fmt;

/// Why the verification service rejected a token (or could not be asked).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationErrorKind {
    InvalidToken,
    ExpiredOrReused,
    BadSecretConfig,
    ServiceUnavailable,
    Unknown { codes: Vec<String> },
}

impl VerificationErrorKind {
    /// Maps `error-codes` from the service. The first recognised code in
    /// secret, response, timeout order decides.
    pub fn from_error_codes(codes: &[String]) -> Self {
        let has = |code: &str| codes.iter().any(|c| c == code);
        if has("invalid-input-secret") {
            VerificationErrorKind::BadSecretConfig
        } else if has("invalid-input-response") {
            VerificationErrorKind::InvalidToken
        } else if has("timeout-or-duplicate") {
            VerificationErrorKind::ExpiredOrReused
        } else {
            VerificationErrorKind::Unknown {
                codes: codes.to_vec(),
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            VerificationErrorKind::InvalidToken => "Invalid captcha response token".to_string(),
            VerificationErrorKind::ExpiredOrReused => {
                "Captcha token has expired or been used already".to_string()
            }
            VerificationErrorKind::BadSecretConfig => {
                "Invalid hCaptcha secret key configuration".to_string()
            }
            VerificationErrorKind::ServiceUnavailable => {
                "Captcha verification service unavailable".to_string()
            }
            VerificationErrorKind::Unknown { codes } if codes.is_empty() => {
                "Captcha verification failed".to_string()
            }
            VerificationErrorKind::Unknown { codes } => codes.join(", "),
        }
    }
}

impl fmt::Display for VerificationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub success: bool,
    pub error_kind: Option<VerificationErrorKind>,
    pub remaining_attempts: Option<u32>,
    pub rate_limited: bool,
}

impl VerificationResult {
    pub fn verified() -> Self {
        VerificationResult {
            success: true,
            error_kind: None,
            remaining_attempts: None,
            rate_limited: false,
        }
    }

    pub fn failed(kind: VerificationErrorKind) -> Self {
        VerificationResult {
            success: false,
            error_kind: Some(kind),
            remaining_attempts: None,
            rate_limited: false,
        }
    }

    pub fn rate_limited() -> Self {
        VerificationResult {
            success: false,
            error_kind: None,
            remaining_attempts: Some(0),
            rate_limited: true,
        }
    }

    pub fn with_remaining_attempts(mut self, remaining: Option<u32>) -> Self {
        self.remaining_attempts = remaining;
        self
    }
}
