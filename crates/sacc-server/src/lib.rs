//! HTTP host for the simple asset chaincode.
//!
//! Exposes `POST /v1/invoke` plus health and info endpoints, and runs a
//! background ticker that fires time-based flush triggers.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::{spawn_flush_ticker, SaccServer};
