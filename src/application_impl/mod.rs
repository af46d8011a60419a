mod captcha_verifier_fake;
mod captcha_verifier_hcaptcha;
mod rate_limiter_impl;
mod verification_service_impl;

pub use captcha_verifier_fake::*;
pub use captcha_verifier_hcaptcha::*;
pub use rate_limiter_impl::*;
pub use verification_service_impl::*;
