//! HTTP API module.
//!
//! Pull-only accessors over the validation engine: clients upload a CSV,
//! then poll progress and fetch the result or report.

pub mod server;
pub mod types;

pub use server::{router, start_server, AppState};
pub use types::*;
