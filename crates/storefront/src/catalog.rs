//! Catalog reads for browsing.
//!
//! Product pages and the options picker read through a short-lived `moka`
//! cache. Anything that decides stock (adding to cart from a fresh read,
//! checkout) uses [`CatalogService::fresh_product`], which goes to the store
//! and refreshes the cache entry.

use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use subasa_core::{Product, ProductId};

use crate::db::{DocumentStore, ProductRepository, RepositoryError};

/// Default time-to-live of cached products.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Cached catalog access over a [`DocumentStore`].
pub struct CatalogService<D> {
    store: D,
    cache: Cache<ProductId, Product>,
}

impl<D: DocumentStore> CatalogService<D> {
    #[must_use]
    pub fn new(store: D, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();
        Self { store, cache }
    }

    #[must_use]
    pub const fn store(&self) -> &D {
        &self.store
    }

    /// A product, possibly from cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails or the document is malformed.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        if let Some(product) = self.cache.get(id).await {
            debug!("Cache hit for product");
            return Ok(Some(product));
        }
        self.fresh_product(id).await
    }

    /// A product read straight from the store. Refreshes the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails or the document is malformed.
    pub async fn fresh_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = ProductRepository::new(&self.store).get(id).await?;
        match &product {
            Some(p) => self.cache.insert(id.clone(), p.clone()).await,
            None => self.cache.invalidate(id).await,
        }
        Ok(product)
    }

    /// Products shown to shoppers (approved only), sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails or a document is malformed.
    pub async fn listed(&self) -> Result<Vec<Product>, RepositoryError> {
        let mut products: Vec<Product> = ProductRepository::new(&self.store)
            .list()
            .await?
            .into_iter()
            .filter(|p| p.status.is_listed())
            .collect();
        products.sort_by(|a, b| a.product_name.cmp(&b.product_name));
        Ok(products)
    }

    /// Write products into the store, replacing any with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails; earlier products stay written.
    #[instrument(skip_all, fields(count = products.len()))]
    pub async fn seed(&self, products: &[Product]) -> Result<usize, RepositoryError> {
        let repo = ProductRepository::new(&self.store);
        for product in products {
            repo.put(product).await?;
            self.cache.invalidate(&product.id).await;
        }
        Ok(products.len())
    }

    /// Drop a cached product, e.g. after checkout changed its stock.
    pub async fn invalidate(&self, id: &ProductId) {
        self.cache.invalidate(id).await;
    }
}
