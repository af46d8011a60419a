// store

mod attempt_store;

pub use attempt_store::*;
