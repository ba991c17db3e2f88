//! Owner service clients
//!
//! Owner services are the external domain services (products, courses, lessons, ...)
//! that keep their own side of an asset association. Every owner type is routed to
//! exactly one [`OwnerServiceClient`] through the [`OwnerClientRegistry`].

pub mod factory;
pub mod http;
pub mod registry;
pub mod traits;

pub use factory::create_owner_registry;
pub use http::HttpOwnerServiceClient;
pub use registry::OwnerClientRegistry;
pub use traits::{OwnerServiceClient, OwnerServiceError, OwnerServiceResult, RemoteStatusCode};
