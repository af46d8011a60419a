mod attempt_store_mysql;

pub use attempt_store_mysql::*;
