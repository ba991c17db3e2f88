//! Assetline persistence
//!
//! Canonical asset store and metadata store: interfaces, PostgreSQL
//! implementations and in-memory implementations.

pub mod db;

pub use db::{
    AssetStore, AssetTransaction, MemoryAssetStore, MemoryMetadataStore, MetadataStore,
    PostgresAssetStore, PostgresMetadataStore,
};
