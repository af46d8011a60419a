use super::cors::cors_headers;
use super::error::recover_error;
use super::handler;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let verify_captcha = warp::path("verify-captcha")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(warp::header::headers_cloned())
        .and(with(server.verification_service.clone()))
        .and_then(handler::verify_captcha);

    let preflight = warp::path("verify-captcha")
        .and(warp::path::end())
        .and(warp::options())
        .map(handler::preflight);

    verify_captcha.or(preflight)
}

/// Routes with error recovery and CORS headers on every response.
pub fn service(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
    routes(server)
        .recover(recover_error)
        .with(warp::reply::with::headers(cors_headers()))
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}
