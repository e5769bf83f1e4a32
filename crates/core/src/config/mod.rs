//! Configuration loading and schema definitions
//!
//! Limits, compression tuning, store location and logging are all read from
//! an optional `slimsnap.toml`; every field has a default.

mod loader;
mod schema;

pub use loader::Config;
pub use schema::*;
