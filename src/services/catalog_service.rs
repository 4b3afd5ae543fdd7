// src/services/catalog_service.rs

use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{error::AppError, response::Paginated},
    db::{CatalogRepository, ProductFilter},
    models::catalog::{
        slugify, Category, CreateCategoryPayload, CreateProductPayload, Product, ProductListQuery,
        ProductStatus, UpdateProductPayload,
    },
};

/// Physical stock after a manual correction. It may never drop below what open orders reserve.
pub fn stock_after_adjustment(product: &Product, delta: i32) -> Result<i32, AppError> {
    let stock = product
        .stock_quantity
        .checked_add(delta)
        .ok_or_else(|| AppError::QuantityExceeded {
            item: product.sku.clone(),
            requested: delta,
            available: i32::MAX - product.stock_quantity,
        })?;
    if stock < product.reserved_quantity {
        return Err(AppError::StockBelowReserved { reserved: product.reserved_quantity });
    }
    Ok(stock)
}

#[derive(Clone)]
pub struct CatalogService {
    repo: CatalogRepository,
}

impl CatalogService {
    pub fn new(repo: CatalogRepository) -> Self {
        Self { repo }
    }

    // --- STOREFRONT ---

    pub async fn list_categories<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Category>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_categories(executor, tenant_id).await
    }

    /// Storefront grids only show active products; the back-office sees every status.
    pub async fn list_products<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        query: &ProductListQuery,
        only_active: bool,
    ) -> Result<Paginated<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let params = query.page_params();
        let filter = ProductFilter {
            only_active,
            category_id: query.category_id,
            search: query.search(),
        };

        let total = self.repo.count_products(&mut *conn, tenant_id, filter).await?;
        let products = self
            .repo
            .list_products(&mut *conn, tenant_id, filter, params.limit(), params.offset())
            .await?;

        Ok(Paginated::new(products, total, &params))
    }

    /// Looks the product up by id when the key parses as one, by slug otherwise.
    /// Products that are not active are hidden from the storefront.
    pub async fn get_product<'e, E>(&self, executor: E, tenant_id: Uuid, key: &str) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = match Uuid::parse_str(key) {
            Ok(id) => self.repo.find_product(executor, tenant_id, id).await?,
            Err(_) => self.repo.find_product_by_slug(executor, tenant_id, key).await?,
        };

        product
            .filter(|p| p.status == ProductStatus::Active)
            .ok_or_else(|| AppError::ResourceNotFound("Product".into()))
    }

    // --- BACK-OFFICE ---

    pub async fn create_category<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        payload: &CreateCategoryPayload,
    ) -> Result<Category, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        if let Some(parent_id) = payload.parent_id {
            if !self.repo.category_exists(&mut *tx, tenant_id, parent_id).await? {
                return Err(AppError::ResourceNotFound("Category".into()));
            }
        }

        let slug = payload.slug.as_deref().map(slugify).unwrap_or_else(|| slugify(&payload.name));
        let category = self
            .repo
            .create_category(
                &mut *tx,
                tenant_id,
                payload.parent_id,
                payload.name.trim(),
                &slug,
                payload.description.as_deref(),
            )
            .await?;

        tx.commit().await?;
        Ok(category)
    }

    pub async fn create_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        payload: &CreateProductPayload,
    ) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        if let Some(category_id) = payload.category_id {
            if !self.repo.category_exists(&mut *tx, tenant_id, category_id).await? {
                return Err(AppError::ResourceNotFound("Category".into()));
            }
        }

        let slug = payload.slug.as_deref().map(slugify).unwrap_or_else(|| slugify(&payload.name));
        let product = self
            .repo
            .create_product(
                &mut *tx,
                tenant_id,
                payload.category_id,
                payload.sku.trim(),
                payload.name.trim(),
                &slug,
                payload.description.as_deref(),
                payload.price,
                payload.stock_quantity,
                payload.status.unwrap_or(ProductStatus::Draft),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant_id, product_id = %product.id, sku = %product.sku, "product created");
        Ok(product)
    }

    pub async fn update_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        product_id: Uuid,
        payload: &UpdateProductPayload,
    ) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        if let Some(category_id) = payload.category_id {
            if !self.repo.category_exists(&mut *tx, tenant_id, category_id).await? {
                return Err(AppError::ResourceNotFound("Category".into()));
            }
        }

        let product = self
            .repo
            .update_product(&mut *tx, tenant_id, product_id, payload)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Product".into()))?;

        tx.commit().await?;
        Ok(product)
    }

    /// Soft delete: archived products disappear from the storefront, order lines keep them.
    pub async fn archive_product<'e, E>(&self, executor: E, tenant_id: Uuid, product_id: Uuid) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let archive = UpdateProductPayload {
            category_id: None,
            name: None,
            description: None,
            price: None,
            status: Some(ProductStatus::Archived),
        };
        self.update_product(executor, tenant_id, product_id, &archive).await
    }

    /// Manual stock correction. Physical stock may never drop below what open orders reserve.
    pub async fn adjust_stock<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        product_id: Uuid,
        delta: i32,
        reason: Option<&str>,
    ) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let product = self
            .repo
            .lock_products(&mut *tx, tenant_id, &[product_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ResourceNotFound("Product".into()))?;

        stock_after_adjustment(&product, delta)?;

        let updated = self
            .repo
            .apply_stock_movement(&mut *tx, tenant_id, product_id, delta, 0)
            .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            product_id = %product_id,
            delta,
            stock = updated.stock_quantity,
            reason = reason.unwrap_or("-"),
            "stock adjusted"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn product(stock: i32, reserved: i32) -> Product {
        Product {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            category_id: None,
            sku: "TEE-M".into(),
            name: "Tee".into(),
            slug: "tee".into(),
            description: None,
            price: Decimal::TEN,
            stock_quantity: stock,
            reserved_quantity: reserved,
            status: ProductStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(10, 4, -6, 4)]
    #[case(10, 4, 5, 15)]
    #[case(0, 0, 3, 3)]
    fn adjustments_within_bounds(#[case] stock: i32, #[case] reserved: i32, #[case] delta: i32, #[case] expected: i32) {
        assert_eq!(stock_after_adjustment(&product(stock, reserved), delta).unwrap(), expected);
    }

    #[test]
    fn stock_never_drops_below_the_reservation() {
        let err = stock_after_adjustment(&product(10, 4), -7).unwrap_err();
        assert!(matches!(err, AppError::StockBelowReserved { reserved: 4 }));
    }

    #[test]
    fn overflowing_stock_is_refused() {
        let err = stock_after_adjustment(&product(10, 0), i32::MAX).unwrap_err();
        assert!(matches!(err, AppError::QuantityExceeded { available, .. } if available == i32::MAX - 10));
    }
}
