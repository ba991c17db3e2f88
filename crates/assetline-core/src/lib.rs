//! Assetline Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, and the
//! pure building blocks of the asset lifecycle engine (cursor codec, owner diff,
//! lifecycle legality table) shared across all Assetline components.

pub mod config;
pub mod cursor;
pub mod diff;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, OwnerServiceEndpoint};
pub use cursor::{CursorCodec, OrderValue, PageCursor};
pub use diff::{diff_owners, group_owners, GroupedOwners, OwnerDiff};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use lifecycle::{ensure_legal, LifecycleOp};
