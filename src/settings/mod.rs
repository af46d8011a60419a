//! Layered settings: a TOML file overridden by `GATEKEEPER__*` environment variables.
//! See `bin/settings_demo.rs` for a binary that prints what was loaded.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
