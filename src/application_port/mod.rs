mod captcha_verifier;
mod rate_limiter;
mod verification_service;

pub use captcha_verifier::*;
pub use rate_limiter::*;
pub use verification_service::*;
