//! HTTP API surface.

pub mod error;
pub mod routes;
pub mod server;

pub use server::{serve, ApiServerConfig, AppState};
