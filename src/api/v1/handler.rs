use super::dto::*;
use super::error::*;
use crate::application_port::{VerificationService, VerifyInput};
use crate::domain_model::{ActionLabel, ClientKey};
use crate::logger::*;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;
use warp::http::{HeaderMap, StatusCode};
use warp::{self, reject};

pub async fn verify_captcha(
    body: VerifyCaptchaRequest,
    headers: HeaderMap,
    verification_service: Arc<dyn VerificationService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let client_key = ClientKey::resolve(body.user_ip.as_deref(), |name| {
        headers.get(name).and_then(|value| value.to_str().ok())
    });
    let action = body
        .action
        .as_deref()
        .map(ActionLabel::parse)
        .unwrap_or_else(ActionLabel::default_label);
    let input = VerifyInput {
        token: body.token,
        action,
        client_key,
    };

    let span = info_span!("verify_captcha", request_id = %uuid::Uuid::new_v4());
    let outcome = AssertUnwindSafe(verification_service.verify(input))
        .catch_unwind()
        .instrument(span)
        .await;

    let result = match outcome {
        Ok(result) => result
            .map_err(ApiErrorCode::from)
            .map_err(reject::custom)?,
        Err(_) => {
            error!("captcha verification panicked");
            return Err(reject::custom(ApiErrorCode::InternalError));
        }
    };

    if result.rate_limited {
        return Err(reject::custom(ApiErrorCode::RateLimited));
    }

    if !result.success {
        let message = result
            .error_kind
            .map(|kind| kind.message())
            .unwrap_or_else(|| "Captcha verification failed".to_string());
        return Err(reject::custom(ApiErrorCode::VerificationFailed {
            message,
            remaining_attempts: result.remaining_attempts,
        }));
    }

    let response = VerifyCaptchaResponse::verified(result.remaining_attempts);
    Ok(warp::reply::json(&response))
}

pub fn preflight() -> impl warp::Reply {
    warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT)
}
