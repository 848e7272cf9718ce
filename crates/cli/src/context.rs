//! What every command opens: configuration, device storage, the cart of
//! the signed-in identity, and the document snapshot.

use thiserror::Error;

use subasa_storefront::db::{MemoryDocumentStore, RepositoryError, StoreError};
use subasa_storefront::identity::Identity;
use subasa_storefront::storage::{FileStorage, StorageError};
use subasa_storefront::{CartError, CartStore, CheckoutError, ConfigError, StorefrontConfig};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("document store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Cart(#[from] CartError),

    #[error("{}", .0.user_message())]
    Checkout(#[from] CheckoutError),

    #[error("gateway error: {0}")]
    Gateway(#[from] subasa_storefront::gateway::GatewayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("no product with id {0}")]
    ProductNotFound(String),

    #[error("no cart line {0}; run `subasa cart show` for line keys")]
    UnknownLine(String),

    #[error("{0}")]
    Usage(String),
}

/// Opened configuration and device state.
pub struct Context {
    pub config: StorefrontConfig,
    pub storage: FileStorage,
}

impl Context {
    /// Load configuration and open the storage directory.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or the directory cannot
    /// be created.
    pub fn open() -> Result<Self, CliError> {
        let config = StorefrontConfig::from_env()?;
        let storage = FileStorage::open(config.storage_dir())?;
        Ok(Self { config, storage })
    }

    /// The persisted identity.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn identity(&self) -> Result<Identity, CliError> {
        Ok(Identity::load(&self.storage)?)
    }

    /// The cart of the persisted identity.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn cart(&self) -> Result<CartStore<FileStorage>, CliError> {
        Ok(CartStore::open(self.storage.clone(), self.identity()?)?)
    }

    /// Load the document snapshot. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    pub async fn documents(&self) -> Result<MemoryDocumentStore, CliError> {
        Ok(MemoryDocumentStore::load(&self.config.catalog_path).await?)
    }

    /// Write the document snapshot back.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub async fn save_documents(&self, store: &MemoryDocumentStore) -> Result<(), CliError> {
        store.save(&self.config.catalog_path).await?;
        Ok(())
    }
}
