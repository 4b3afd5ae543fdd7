// src/services/wishlist_service.rs

use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CartRepository, CatalogRepository},
    models::cart::WishlistEntry,
    services::cart_service::{ensure_available, MAX_LINE_QUANTITY},
};

#[derive(Clone)]
pub struct WishlistService {
    cart_repo: CartRepository,
    catalog_repo: CatalogRepository,
}

impl WishlistService {
    pub fn new(cart_repo: CartRepository, catalog_repo: CatalogRepository) -> Self {
        Self { cart_repo, catalog_repo }
    }

    pub async fn list<'e, E>(&self, executor: E, tenant_id: Uuid, customer_id: Uuid) -> Result<Vec<WishlistEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.cart_repo.list_wishlist(executor, tenant_id, customer_id).await
    }

    /// Adding a product twice is a no-op.
    pub async fn add<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<WishlistEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;

        self.catalog_repo
            .find_product(&mut *conn, tenant_id, product_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Product".into()))?;

        self.cart_repo
            .add_to_wishlist(&mut *conn, tenant_id, customer_id, product_id)
            .await?;

        self.cart_repo.list_wishlist(&mut *conn, tenant_id, customer_id).await
    }

    pub async fn remove<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<WishlistEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;

        let removed = self
            .cart_repo
            .remove_from_wishlist(&mut *conn, tenant_id, customer_id, product_id)
            .await?;
        if removed == 0 {
            return Err(AppError::ResourceNotFound("Wishlist item".into()));
        }

        self.cart_repo.list_wishlist(&mut *conn, tenant_id, customer_id).await
    }

    /// Puts one unit in the cart (on top of what is there) and drops the wishlist entry.
    pub async fn move_to_cart<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<WishlistEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let removed = self
            .cart_repo
            .remove_from_wishlist(&mut *tx, tenant_id, customer_id, product_id)
            .await?;
        if removed == 0 {
            return Err(AppError::ResourceNotFound("Wishlist item".into()));
        }

        let product = self
            .catalog_repo
            .find_product(&mut *tx, tenant_id, product_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Product".into()))?;
        if !product.is_sellable() {
            return Err(AppError::ProductUnavailable(product.name));
        }

        let cart = self.cart_repo.get_or_create_cart(&mut *tx, tenant_id, customer_id).await?;
        let current = self.cart_repo.line_quantity(&mut *tx, tenant_id, cart.id, product_id).await?;
        let wanted = (current + 1).min(MAX_LINE_QUANTITY);
        ensure_available(&product, wanted)?;

        self.cart_repo
            .set_product_quantity(&mut *tx, tenant_id, cart.id, product_id, wanted)
            .await?;

        let remaining = self.cart_repo.list_wishlist(&mut *tx, tenant_id, customer_id).await?;
        tx.commit().await?;
        Ok(remaining)
    }
}
