// src/db/catalog_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::catalog::{Category, Product, ProductStatus, UpdateProductPayload},
};

const PRODUCT_COLUMNS: &str = "id, tenant_id, category_id, sku, name, slug, description, price, \
     stock_quantity, reserved_quantity, status, created_at, updated_at";

/// Filters shared by the storefront and back-office product grids.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFilter<'a> {
    pub only_active: bool,
    pub category_id: Option<Uuid>,
    pub search: Option<&'a str>,
}

#[derive(Clone, Default)]
pub struct CatalogRepository;

impl CatalogRepository {
    pub fn new() -> Self {
        Self
    }

    // --- CATEGORIES ---

    pub async fn list_categories<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Category>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, tenant_id, parent_id, name, slug, description, created_at, updated_at
            FROM categories
            WHERE tenant_id = $1
            ORDER BY parent_id NULLS FIRST, name
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;
        Ok(categories)
    }

    pub async fn category_exists<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE tenant_id = $1 AND id = $2)")
                .bind(tenant_id)
                .bind(id)
                .fetch_one(executor)
                .await?;
        Ok(exists)
    }

    pub async fn create_category<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<Category, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (tenant_id, parent_id, name, slug, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, tenant_id, parent_id, name, slug, description, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(parent_id)
        .bind(name)
        .bind(slug)
        .bind(description)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, slug))
    }

    // --- PRODUCTS ---

    pub async fn list_products<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: ProductFilter<'_>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE tenant_id = $1
              AND ($2 = FALSE OR status = 'active')
              AND ($3::uuid IS NULL OR category_id = $3)
              AND ($4::text IS NULL OR name ILIKE '%' || $4 || '%' OR sku ILIKE '%' || $4 || '%')
            ORDER BY name, id
            LIMIT $5 OFFSET $6
            "#
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(filter.only_active)
            .bind(filter.category_id)
            .bind(filter.search)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await?;
        Ok(products)
    }

    pub async fn count_products<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: ProductFilter<'_>,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM products
            WHERE tenant_id = $1
              AND ($2 = FALSE OR status = 'active')
              AND ($3::uuid IS NULL OR category_id = $3)
              AND ($4::text IS NULL OR name ILIKE '%' || $4 || '%' OR sku ILIKE '%' || $4 || '%')
            "#,
        )
        .bind(tenant_id)
        .bind(filter.only_active)
        .bind(filter.category_id)
        .bind(filter.search)
        .fetch_one(executor)
        .await?;
        Ok(total)
    }

    pub async fn find_product<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = $1 AND id = $2");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(product)
    }

    pub async fn find_product_by_slug<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = $1 AND slug = $2");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(slug)
            .fetch_optional(executor)
            .await?;
        Ok(product)
    }

    /// Locks product rows for a stock change. Rows are locked in id order so two
    /// checkouts touching the same products cannot deadlock.
    pub async fn lock_products<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = $1 AND id = ANY($2) ORDER BY id FOR UPDATE"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(ids)
            .fetch_all(executor)
            .await?;
        Ok(products)
    }

    pub async fn create_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        category_id: Option<Uuid>,
        sku: &str,
        name: &str,
        slug: &str,
        description: Option<&str>,
        price: Decimal,
        stock_quantity: i32,
        status: ProductStatus,
    ) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO products (tenant_id, category_id, sku, name, slug, description, price, stock_quantity, status)
            VALUES ($1, $2, upper($3), $4, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(category_id)
            .bind(sku)
            .bind(name)
            .bind(slug)
            .bind(description)
            .bind(price)
            .bind(stock_quantity)
            .bind(status)
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, sku))
    }

    // Absent fields keep their value.
    pub async fn update_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        input: &UpdateProductPayload,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE products SET
                category_id = COALESCE($3, category_id),
                name = COALESCE($4, name),
                description = COALESCE($5, description),
                price = COALESCE($6, price),
                status = COALESCE($7, status),
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(input.category_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.price)
            .bind(input.status)
            .fetch_optional(executor)
            .await?;
        Ok(product)
    }

    /// Moves physical and reserved stock in one statement. The table checks keep
    /// both non-negative and reserved below physical.
    pub async fn apply_stock_movement<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        product_id: Uuid,
        stock_delta: i32,
        reserved_delta: i32,
    ) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE products SET
                stock_quantity = stock_quantity + $3,
                reserved_quantity = reserved_quantity + $4,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(product_id)
            .bind(stock_delta)
            .bind(reserved_delta)
            .fetch_one(executor)
            .await?;
        Ok(product)
    }
}
