//! Browser-side half of the verification gate: the challenge widget wrapper, the
//! per-action coordinator, and the HTTP client for `POST /verify-captcha`.
//! The widget library itself is reached only through [`WidgetHost`].

mod coordinator;
mod endpoint;
mod ip_lookup;
mod script_loader;
mod widget;

pub use coordinator::*;
pub use endpoint::*;
pub use ip_lookup::*;
pub use script_loader::*;
pub use widget::*;

#[cfg(test)]
pub(crate) use widget::testing;
