use super::dto::VerifyCaptchaResponse;
use crate::application_port::VerificationServiceError;
use crate::logger::*;
use std::convert::Infallible;
use thiserror::Error;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        code.clone()
    } else if err.is_not_found() {
        ApiErrorCode::NotFound
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        ApiErrorCode::PayloadTooLarge
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
    {
        ApiErrorCode::InvalidBody
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        // the OPTIONS route adds this to every POST rejection, so it is checked last
        ApiErrorCode::MethodNotAllowed
    } else {
        error!("Unhandled rejection: {:?}", err);
        ApiErrorCode::InternalError
    };

    let json = warp::reply::json(&code.body());
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Clone, Error)]
pub enum ApiErrorCode {
    #[error("Captcha token is required")]
    MissingToken,
    #[error("Invalid request body")]
    InvalidBody,
    #[error("{message}")]
    VerificationFailed {
        message: String,
        remaining_attempts: Option<u32>,
    },
    #[error("Too many attempts. Please try again later.")]
    RateLimited,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Not found")]
    NotFound,
    #[error("Request body too large")]
    PayloadTooLarge,
    #[error("Internal server error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::MissingToken
            | ApiErrorCode::InvalidBody
            | ApiErrorCode::VerificationFailed { .. } => StatusCode::BAD_REQUEST,
            ApiErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> VerifyCaptchaResponse {
        let mut body = VerifyCaptchaResponse::error(self.to_string());
        match self {
            ApiErrorCode::VerificationFailed {
                remaining_attempts, ..
            } => body.remaining_attempts = *remaining_attempts,
            ApiErrorCode::RateLimited => body.rate_limited = Some(true),
            _ => {}
        }
        body
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<VerificationServiceError> for ApiErrorCode {
    fn from(error: VerificationServiceError) -> Self {
        match error {
            VerificationServiceError::MissingToken => ApiErrorCode::MissingToken,
            VerificationServiceError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}
