mod client;
mod ops;

pub use client::{is_undefined_table, PostgresClient};
