//! Local catalog snapshot management.
//!
//! The snapshot stands in for the hosted document database: `catalog seed`
//! writes products into it, checkout reads and writes it.

use std::path::Path;

use tracing::info;

use subasa_core::{Price, Product, ProductId};
use subasa_storefront::catalog::CatalogService;

use crate::context::{CliError, Context};

/// Read a JSON array of products.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not a product array, or
/// a product has no id.
pub async fn read_products(path: &Path) -> Result<Vec<Product>, CliError> {
    let bytes = tokio::fs::read(path).await?;
    let products: Vec<Product> = serde_json::from_slice(&bytes)?;
    if let Some(unnamed) = products.iter().position(|p| p.id.as_str().trim().is_empty()) {
        return Err(CliError::Usage(format!("product #{} has no id", unnamed + 1)));
    }
    Ok(products)
}

/// Write products from `file` into the snapshot.
///
/// # Errors
///
/// Returns an error if the file is invalid or the snapshot cannot be saved.
pub async fn seed(ctx: &Context, file: &str) -> Result<(), CliError> {
    let products = read_products(Path::new(file)).await?;
    let catalog = CatalogService::new(ctx.documents().await?, ctx.config.catalog_ttl);
    let written = catalog.seed(&products).await?;
    ctx.save_documents(catalog.store()).await?;
    info!("Seeded {written} product(s) into {}", ctx.config.catalog_path.display());
    Ok(())
}

/// List products shown to shoppers.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be read.
pub async fn list(ctx: &Context) -> Result<(), CliError> {
    let catalog = CatalogService::new(ctx.documents().await?, ctx.config.catalog_ttl);
    let products = catalog.listed().await?;
    if products.is_empty() {
        info!("No listed products");
    }
    for product in products {
        info!(
            "  {:<16} {} {} (seller {})",
            product.id,
            product.product_name,
            Price::vnd(product.sale_price()),
            product.seller(),
        );
        for size in product.available_sizes() {
            info!("      size {}: {} left", size.size, size.quantity);
        }
    }
    Ok(())
}

/// Look up a single product by id.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be read.
pub async fn find(ctx: &Context, id: &str) -> Result<Option<Product>, CliError> {
    let catalog = CatalogService::new(ctx.documents().await?, ctx.config.catalog_ttl);
    Ok(catalog.fresh_product(&ProductId::new(id)).await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use subasa_storefront::StorefrontConfig;
    use subasa_storefront::storage::FileStorage;

    fn context(dir: &Path) -> Context {
        let data_dir = dir.to_string_lossy().into_owned();
        let config = StorefrontConfig::from_lookup(|key| match key {
            "SUBASA_GATEWAY_URL" => Some("http://127.0.0.1:9/".to_string()),
            "SUBASA_DATA_DIR" => Some(data_dir.clone()),
            _ => None,
        })
        .unwrap();
        let storage = FileStorage::open(config.storage_dir()).unwrap();
        Context { config, storage }
    }

    #[tokio::test]
    async fn test_seed_then_find() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let file = dir.path().join("products.json");
        std::fs::write(
            &file,
            r#"[{"id":"p1","productName":"Giay","price":500000,"quantity":3,"status":"approved"}]"#,
        )
        .unwrap();

        seed(&ctx, file.to_str().unwrap()).await.unwrap();
        assert!(ctx.config.catalog_path.exists());

        let product = find(&ctx, "p1").await.unwrap().unwrap();
        assert_eq!(product.product_name, "Giay");
        assert_eq!(product.quantity, 3);
        assert!(find(&ctx, "p2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_seed_rejects_missing_id() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("products.json");
        std::fs::write(&file, r#"[{"productName":"Giay","price":1}]"#).unwrap();
        assert!(matches!(read_products(&file).await, Err(CliError::Usage(_))));
    }
}
