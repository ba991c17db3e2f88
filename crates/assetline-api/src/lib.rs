//! Assetline API Library
//!
//! Thin HTTP surface over the lifecycle services: admin asset endpoints, the
//! platform webhook endpoint and health, plus application setup.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
mod telemetry;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use handlers::actor::Actor;
