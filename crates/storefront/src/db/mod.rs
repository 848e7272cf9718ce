//! Access to the hosted document database.
//!
//! # Collections
//!
//! - `products/{id}` - catalog entries, stock lives here
//! - `orders/{id}` - one document per seller per checkout, store-assigned keys
//! - `users/{id}` - profile documents, read for the confirmation email address
//!
//! Every document carries a version that changes on each write. Stock updates
//! go through [`DocumentStore::update_if_version`] so two shoppers can never
//! both take the last unit.

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use subasa_core::DocumentId;

pub mod memory;
pub mod orders;
pub mod products;
pub mod users;

pub use memory::MemoryDocumentStore;
pub use orders::OrderRepository;
pub use products::{ProductRepository, StockError};
pub use users::UserRepository;

pub const PRODUCTS: &str = "products";
pub const ORDERS: &str = "orders";
pub const USERS: &str = "users";

/// Errors raised by a [`DocumentStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// A conditional write lost a race.
    #[error("version mismatch on {path}: expected {expected}, found {actual}")]
    VersionMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// The document to update does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the typed repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Backend failure.
    #[error("document store error: {0}")]
    Store(#[from] StoreError),

    /// A stored document does not match the expected shape.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested document was not found.
    #[error("not found")]
    NotFound,

    /// Write rejected by a business rule (e.g. illegal status transition).
    #[error("conflict: {0}")]
    Conflict(String),
}

/// A document together with its key and current version.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: Value,
    pub version: u64,
}

/// Minimal document database interface.
///
/// Implementations must be thread-safe; every method is a single round trip.
pub trait DocumentStore: Send + Sync {
    /// Fetch one document.
    fn get(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Fetch every document in a collection.
    fn list(&self, collection: &str) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    /// Insert a document under a fresh store-assigned key.
    fn create(
        &self,
        collection: &str,
        data: Value,
    ) -> impl Future<Output = Result<DocumentId, StoreError>> + Send;

    /// Insert or overwrite a document unconditionally. Returns the new version.
    fn set(
        &self,
        collection: &str,
        id: &DocumentId,
        data: Value,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Overwrite a document only if its version is still `expected_version`.
    ///
    /// Returns the new version, [`StoreError::VersionMismatch`] if someone
    /// else wrote first, or [`StoreError::NotFound`].
    fn update_if_version(
        &self,
        collection: &str,
        id: &DocumentId,
        data: Value,
        expected_version: u64,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// Decode a document body, reporting shape errors as corruption.
fn decode<T: serde::de::DeserializeOwned>(doc: &Document, collection: &str) -> Result<T, RepositoryError> {
    serde_json::from_value(doc.data.clone()).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid {collection}/{}: {e}", doc.id))
    })
}
