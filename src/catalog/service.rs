use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{CatalogStore, Product, ProductDraft, QrisCode, QrisDraft, QrisUpdate};
use crate::error::AppError;

/// Stock assumed when a product or variant is saved without one.
pub const DEFAULT_STOCK: i64 = 100;

fn product_not_found() -> AppError {
    AppError::NotFound("Product not found".to_string())
}

fn qris_not_found() -> AppError {
    AppError::NotFound("QRIS not found".to_string())
}

/// Checks a submitted product and fills in the defaults the storefront
/// relies on.
fn prepare(mut draft: ProductDraft, creating: bool) -> Result<ProductDraft, AppError> {
    draft.name = draft.name.trim().to_string();
    if draft.name.is_empty() {
        return Err(AppError::ValidationError("Product name is required".to_string()));
    }
    if draft.price < 0.0 {
        return Err(AppError::ValidationError("Price cannot be negative".to_string()));
    }
    if draft.stock < 0 {
        return Err(AppError::ValidationError("Stock cannot be negative".to_string()));
    }

    if draft.stock == 0 {
        draft.stock = DEFAULT_STOCK;
    }
    if draft.min_order < 1 {
        draft.min_order = 1;
    }
    if creating && draft.is_available.is_none() {
        draft.is_available = Some(true);
    }

    draft.variants.retain(|variant| !variant.name.trim().is_empty());
    for variant in &mut draft.variants {
        variant.name = variant.name.trim().to_string();
        if variant.stock <= 0 {
            variant.stock = DEFAULT_STOCK;
        }
        if creating {
            variant.is_available = Some(true);
        }
    }

    Ok(draft)
}

pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// What customers see: available products only.
    pub async fn storefront(&self) -> Result<Vec<Product>, AppError> {
        self.store.list_products(true).await
    }

    pub async fn all_products(&self) -> Result<Vec<Product>, AppError> {
        self.store.list_products(false).await
    }

    /// A product as shown to customers. Hidden products look missing.
    pub async fn available_product(&self, id: Uuid) -> Result<Product, AppError> {
        match self.store.find_product(id).await? {
            Some(product) if product.is_available => Ok(product),
            _ => Err(product_not_found()),
        }
    }

    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product, AppError> {
        let draft = prepare(draft, true)?;
        let product = self.store.create_product(&draft).await?;
        info!(id = %product.id, name = %product.name, variants = product.variants.len(), "Product created");
        Ok(product)
    }

    pub async fn update_product(&self, id: Uuid, draft: ProductDraft) -> Result<Product, AppError> {
        let draft = prepare(draft, false)?;
        let product = self
            .store
            .update_product(id, &draft)
            .await?
            .ok_or_else(product_not_found)?;
        info!(id = %product.id, variants = product.variants.len(), "Product updated");
        Ok(product)
    }

    pub async fn delete_product(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_product(id).await? {
            return Err(product_not_found());
        }
        info!(%id, "Product deleted");
        Ok(())
    }

    pub async fn toggle_availability(&self, id: Uuid) -> Result<Product, AppError> {
        let product = self
            .store
            .toggle_product(id)
            .await?
            .ok_or_else(product_not_found)?;
        info!(%id, is_available = product.is_available, "Product availability toggled");
        Ok(product)
    }

    /// The payment code linked to a product, or `None` when it has none.
    pub async fn qris_for_product(&self, product_id: Uuid) -> Result<Option<QrisCode>, AppError> {
        let product = self
            .store
            .find_product(product_id)
            .await?
            .ok_or_else(product_not_found)?;

        match product.qris_id {
            Some(qris_id) => Ok(Some(
                self.store.find_qris(qris_id).await?.ok_or_else(qris_not_found)?,
            )),
            None => Ok(None),
        }
    }

    pub async fn qris_codes(&self) -> Result<Vec<QrisCode>, AppError> {
        self.store.list_qris().await
    }

    pub async fn create_qris(&self, draft: QrisDraft) -> Result<QrisCode, AppError> {
        let draft = QrisDraft {
            name: draft.name.trim().to_string(),
            image_url: draft.image_url.trim().to_string(),
        };
        if draft.name.is_empty() || draft.image_url.is_empty() {
            return Err(AppError::ValidationError(
                "Name and image URL are required".to_string(),
            ));
        }

        let qris = self.store.create_qris(&draft).await?;
        info!(id = %qris.id, name = %qris.name, "QRIS created");
        Ok(qris)
    }

    pub async fn update_qris(&self, id: Uuid, update: QrisUpdate) -> Result<QrisCode, AppError> {
        // Blank strings leave the stored value alone.
        let update = QrisUpdate {
            name: update.name.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            image_url: update
                .image_url
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            is_active: update.is_active,
        };
        self.store
            .update_qris(id, &update)
            .await?
            .ok_or_else(qris_not_found)
    }

    /// Refused while any product still points at the code.
    pub async fn delete_qris(&self, id: Uuid) -> Result<(), AppError> {
        let in_use = self.store.count_products_using_qris(id).await?;
        if in_use > 0 {
            warn!(%id, in_use, "Refused to delete QRIS still linked to products");
            return Err(AppError::ValidationError(format!(
                "Cannot delete QRIS. It is still used by {} product(s)",
                in_use
            )));
        }

        if !self.store.delete_qris(id).await? {
            return Err(qris_not_found());
        }
        info!(%id, "QRIS deleted");
        Ok(())
    }
}
