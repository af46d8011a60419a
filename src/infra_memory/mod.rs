mod attempt_store_memory;

pub use attempt_store_memory::*;
