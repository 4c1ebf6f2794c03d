//! Storage layer for CRM Hub
//!
//! Provides persistence for customers, orders and campaigns.
//! Supports both in-memory (for development) and Couchbase backends.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "couchbase")]
pub mod couchbase;

pub use error::StorageError;
pub use memory::InMemoryStorage;
pub use traits::{CampaignStorage, CustomerStorage, OrderStorage};

#[cfg(feature = "couchbase")]
pub use couchbase::{CouchbaseConfig, CouchbaseStorage};

/// Unified storage trait
#[async_trait::async_trait]
pub trait Storage: CustomerStorage + OrderStorage + CampaignStorage + Send + Sync {}

#[async_trait::async_trait]
impl<T> Storage for T where T: CustomerStorage + OrderStorage + CampaignStorage + Send + Sync {}
