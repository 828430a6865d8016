//! Shell module - the tokio host loop and async resources.

pub mod runtime;

pub use runtime::{init_tracing, run_local, spawn_resource};
