//! Database repositories for the data access layer
//!
//! `store` holds the interfaces the services program against. The canonical
//! asset store and the metadata store live on separate pools and are never
//! joined in one transaction.
//
// Store interfaces
pub mod store;
//
// PostgreSQL implementations
pub mod asset;
pub mod metadata;
//
// In-memory implementations (tests, local development)
pub mod memory;

pub use asset::{PgAssetTransaction, PostgresAssetStore};
pub use memory::{MemoryAssetStore, MemoryAssetTransaction, MemoryMetadataStore};
pub use metadata::PostgresMetadataStore;
pub use store::{AssetStore, AssetTransaction, MetadataStore};
