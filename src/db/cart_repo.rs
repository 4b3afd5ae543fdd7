// src/db/cart_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::cart::{Cart, CartLine, WishlistEntry},
};

#[derive(Clone, Default)]
pub struct CartRepository;

impl CartRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_or_create_cart<'e, E>(&self, executor: E, tenant_id: Uuid, customer_id: Uuid) -> Result<Cart, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            INSERT INTO carts (tenant_id, customer_id)
            VALUES ($1, $2)
            ON CONFLICT (tenant_id, customer_id) DO UPDATE SET updated_at = NOW()
            RETURNING id, tenant_id, customer_id, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_one(executor)
        .await?;
        Ok(cart)
    }

    /// Checkout holds this lock so the cart cannot change while the order is placed.
    pub async fn lock_cart<'e, E>(&self, executor: E, tenant_id: Uuid, customer_id: Uuid) -> Result<Option<Cart>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            SELECT id, tenant_id, customer_id, created_at, updated_at
            FROM carts
            WHERE tenant_id = $1 AND customer_id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_optional(executor)
        .await?;
        Ok(cart)
    }

    pub async fn list_lines<'e, E>(&self, executor: E, tenant_id: Uuid, cart_id: Uuid) -> Result<Vec<CartLine>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT ci.id, ci.product_id, p.sku, p.name, p.slug, p.price, ci.quantity,
                   GREATEST(p.stock_quantity - p.reserved_quantity, 0) AS available,
                   p.status AS product_status
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.tenant_id = $1 AND ci.cart_id = $2
            ORDER BY ci.created_at, ci.id
            "#,
        )
        .bind(tenant_id)
        .bind(cart_id)
        .fetch_all(executor)
        .await?;
        Ok(lines)
    }

    pub async fn line_quantity<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        cart_id: Uuid,
        product_id: Uuid,
    ) -> Result<i32, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let qty: Option<i32> = sqlx::query_scalar(
            "SELECT quantity FROM cart_items WHERE tenant_id = $1 AND cart_id = $2 AND product_id = $3",
        )
        .bind(tenant_id)
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(executor)
        .await?;
        Ok(qty.unwrap_or(0))
    }

    /// Sets the absolute quantity of a product in the cart.
    pub async fn set_product_quantity<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO cart_items (tenant_id, cart_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            "#,
        )
        .bind(tenant_id)
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Product behind a cart line, if the line belongs to this cart.
    pub async fn line_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        cart_id: Uuid,
        line_id: Uuid,
    ) -> Result<Option<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT product_id FROM cart_items WHERE tenant_id = $1 AND cart_id = $2 AND id = $3",
        )
        .bind(tenant_id)
        .bind(cart_id)
        .bind(line_id)
        .fetch_optional(executor)
        .await?;
        Ok(product_id)
    }

    pub async fn delete_line<'e, E>(&self, executor: E, tenant_id: Uuid, cart_id: Uuid, line_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM cart_items WHERE tenant_id = $1 AND cart_id = $2 AND id = $3")
            .bind(tenant_id)
            .bind(cart_id)
            .bind(line_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn clear<'e, E>(&self, executor: E, tenant_id: Uuid, cart_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM cart_items WHERE tenant_id = $1 AND cart_id = $2")
            .bind(tenant_id)
            .bind(cart_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    // --- WISHLIST ---

    pub async fn list_wishlist<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Vec<WishlistEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entries = sqlx::query_as::<_, WishlistEntry>(
            r#"
            SELECT w.id, w.product_id, p.sku, p.name, p.slug, p.price,
                   GREATEST(p.stock_quantity - p.reserved_quantity, 0) AS available,
                   p.status AS product_status, w.created_at
            FROM wishlist_items w
            JOIN products p ON p.id = w.product_id
            WHERE w.tenant_id = $1 AND w.customer_id = $2
            ORDER BY w.created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_all(executor)
        .await?;
        Ok(entries)
    }

    // Idempotent.
    pub async fn add_to_wishlist<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO wishlist_items (tenant_id, customer_id, product_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (customer_id, product_id) DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(product_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn remove_from_wishlist<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "DELETE FROM wishlist_items WHERE tenant_id = $1 AND customer_id = $2 AND product_id = $3",
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(product_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
