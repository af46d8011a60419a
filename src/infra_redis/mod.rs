mod attempt_store_redis;

pub use attempt_store_redis::*;
