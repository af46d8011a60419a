mod cors;
mod dto;
mod error;
mod handler;
mod router;

pub use cors::*;
pub use dto::*;
pub use error::recover_error;
pub use error::ApiErrorCode;
pub use router::{routes, service};
