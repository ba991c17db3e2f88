//! Data models for the asset lifecycle engine
//!
//! Each sub-module represents one slice of the domain: the canonical asset
//! record, its metadata document, owners, audit trail, typed patches and listing.

mod asset;
mod audit;
mod listing;
mod metadata;
mod owner;
mod patch;
mod requests;

pub use asset::*;
pub use audit::*;
pub use listing::*;
pub use metadata::*;
pub use owner::*;
pub use patch::*;
pub use requests::*;
