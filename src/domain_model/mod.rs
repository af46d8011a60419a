mod action;
mod attempt;
mod client_key;
mod verification;

pub use action::*;
pub use attempt::*;
pub use client_key::*;
pub use verification::*;
