use serde::{Deserialize, Serialize};

/// Body of `POST /verify-captcha`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCaptchaRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ip: Option<String>,
}

/// Every response of the endpoint, success or error, has this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCaptchaResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
}

impl VerifyCaptchaResponse {
    pub fn verified(remaining_attempts: Option<u32>) -> Self {
        VerifyCaptchaResponse {
            success: Some(true),
            message: Some("Captcha verified successfully".to_string()),
            remaining_attempts,
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        VerifyCaptchaResponse {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(false)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited.unwrap_or(false)
    }
}
