//! Product repository.
//!
//! Stock changes are read-modify-write cycles guarded by the document
//! version: re-read the product, adjust only the authoritative bucket, write
//! back with [`DocumentStore::update_if_version`]. A lost race is retried a
//! bounded number of times; a bucket that cannot cover the request is never
//! written.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use subasa_core::{DocumentId, InsufficientStock, Product, ProductId};

use super::{Document, DocumentStore, PRODUCTS, RepositoryError, StoreError, decode};

/// Conditional writes attempted before giving up on a contended product.
pub const MAX_STOCK_ATTEMPTS: u32 = 5;

/// Reasons a stock decrement can fail.
#[derive(Debug, Error)]
pub enum StockError {
    /// The product document is gone.
    #[error("product {0} no longer exists")]
    Missing(ProductId),

    /// Not enough units left.
    #[error("product {product}: {source}")]
    Insufficient {
        product: ProductId,
        #[source]
        source: InsufficientStock,
    },

    /// Every conditional write lost a race.
    #[error("product {product} changed {attempts} times while updating stock")]
    Contended { product: ProductId, attempts: u32 },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl StockError {
    /// Whether the shopper can reasonably retry after refreshing the cart.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }
}

/// Repository for `products/{id}`.
pub struct ProductRepository<'a, D> {
    store: &'a D,
}

impl<'a, D: DocumentStore> ProductRepository<'a, D> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(store: &'a D) -> Self {
        Self { store }
    }

    /// Get a product by id, straight from the store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the document is malformed.
    pub async fn get(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.get_versioned(id).await?.map(|(product, _)| product))
    }

    /// List every product in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if any document is malformed.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        self.store
            .list(PRODUCTS)
            .await?
            .iter()
            .map(to_product)
            .collect()
    }

    /// Insert or replace a product. The `id` field becomes the document key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn put(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut data = serde_json::to_value(product).map_err(StoreError::from)?;
        if let Some(obj) = data.as_object_mut() {
            obj.remove("id");
        }
        self.store
            .set(PRODUCTS, &doc_id(&product.id), data)
            .await?;
        Ok(())
    }

    /// Atomically take `qty` units of `size` from a product.
    ///
    /// Sized products lose units from the matching size entry only; sizeless
    /// products from the flat quantity. Other fields of the stored document
    /// are written back untouched. Returns the product as written.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Insufficient` (nothing written) when the bucket
    /// cannot cover `qty`, `StockError::Missing` if the product is gone,
    /// `StockError::Contended` after [`MAX_STOCK_ATTEMPTS`] lost races, or
    /// `StockError::Repository` on backend failure.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn decrement_stock(
        &self,
        id: &ProductId,
        size: &str,
        qty: u32,
    ) -> Result<Product, StockError> {
        self.adjust_stock(id, |product| {
            product
                .take_stock(size, qty)
                .map_err(|source| StockError::Insufficient {
                    product: id.clone(),
                    source,
                })
        })
        .await
    }

    /// Put back units taken by [`Self::decrement_stock`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::decrement_stock`], minus `Insufficient`.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn restore_stock(
        &self,
        id: &ProductId,
        size: &str,
        qty: u32,
    ) -> Result<Product, StockError> {
        self.adjust_stock(id, |product| {
            product.restore_stock(size, qty);
            Ok(())
        })
        .await
    }

    async fn adjust_stock<F>(&self, id: &ProductId, mut apply: F) -> Result<Product, StockError>
    where
        F: FnMut(&mut Product) -> Result<(), StockError>,
    {
        let key = doc_id(id);

        for attempt in 1..=MAX_STOCK_ATTEMPTS {
            let doc = self
                .store
                .get(PRODUCTS, &key)
                .await
                .map_err(RepositoryError::from)?
                .ok_or_else(|| StockError::Missing(id.clone()))?;

            let mut product = to_product(&doc)?;
            apply(&mut product)?;

            let data = patch_stock(doc.data, &product)?;
            match self
                .store
                .update_if_version(PRODUCTS, &key, data, doc.version)
                .await
            {
                Ok(version) => {
                    debug!(attempt, version, "Stock updated");
                    return Ok(product);
                }
                Err(StoreError::VersionMismatch { .. }) => {
                    debug!(attempt, "Stock changed concurrently, retrying");
                }
                Err(StoreError::NotFound(_)) => return Err(StockError::Missing(id.clone())),
                Err(e) => return Err(RepositoryError::from(e).into()),
            }
        }

        warn!(attempts = MAX_STOCK_ATTEMPTS, "Giving up on contended stock update");
        Err(StockError::Contended {
            product: id.clone(),
            attempts: MAX_STOCK_ATTEMPTS,
        })
    }

    async fn get_versioned(&self, id: &ProductId) -> Result<Option<(Product, u64)>, RepositoryError> {
        match self.store.get(PRODUCTS, &doc_id(id)).await? {
            Some(doc) => Ok(Some((to_product(&doc)?, doc.version))),
            None => Ok(None),
        }
    }
}

fn doc_id(id: &ProductId) -> DocumentId {
    DocumentId::new(id.as_str())
}

fn to_product(doc: &Document) -> Result<Product, RepositoryError> {
    let mut product: Product = decode(doc, PRODUCTS)?;
    product.id = ProductId::new(doc.id.as_str());
    Ok(product)
}

/// Copy the authoritative stock field of `product` into the stored body.
fn patch_stock(mut data: Value, product: &Product) -> Result<Value, RepositoryError> {
    let obj = data.as_object_mut().ok_or_else(|| {
        RepositoryError::DataCorruption(format!("{PRODUCTS}/{} is not an object", product.id))
    })?;

    if product.has_size {
        let sizes = serde_json::to_value(&product.sizes).map_err(StoreError::from)?;
        obj.insert("sizes".to_owned(), sizes);
    } else {
        obj.insert("quantity".to_owned(), Value::from(product.quantity));
    }
    Ok(data)
}
