// src/services/cart_service.rs

use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CartRepository, CatalogRepository, SettingsRepository},
    models::{
        cart::{CartLine, CartTotals, CartView},
        catalog::{Product, ProductStatus},
        sales::ShippingMethod,
        settings::TenantSettings,
    },
    services::totals::{self, LineAmounts},
};

pub const MAX_LINE_QUANTITY: i32 = 999;

#[derive(Clone)]
pub struct CartService {
    cart_repo: CartRepository,
    catalog_repo: CatalogRepository,
    settings_repo: SettingsRepository,
}

impl CartService {
    pub fn new(cart_repo: CartRepository, catalog_repo: CatalogRepository, settings_repo: SettingsRepository) -> Self {
        Self { cart_repo, catalog_repo, settings_repo }
    }

    pub async fn get_cart<'e, E>(&self, executor: E, tenant_id: Uuid, customer_id: Uuid) -> Result<CartView, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;

        let cart = self.cart_repo.get_or_create_cart(&mut *conn, tenant_id, customer_id).await?;
        let items = self.cart_repo.list_lines(&mut *conn, tenant_id, cart.id).await?;
        let settings = self.settings_repo.get_settings(&mut *conn, tenant_id).await?;

        let totals = cart_totals(&items, &settings);
        Ok(CartView {
            cart_id: cart.id,
            currency: settings.currency,
            items,
            totals,
        })
    }

    /// Adds to the quantity already in the cart for that product.
    pub async fn add_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let mut tx = (&mut *conn).begin().await?;

        let cart = self.cart_repo.get_or_create_cart(&mut *tx, tenant_id, customer_id).await?;
        let product = self.sellable_product(&mut *tx, tenant_id, product_id).await?;

        let current = self.cart_repo.line_quantity(&mut *tx, tenant_id, cart.id, product_id).await?;
        let wanted = (current + quantity).min(MAX_LINE_QUANTITY);
        ensure_available(&product, wanted)?;

        self.cart_repo
            .set_product_quantity(&mut *tx, tenant_id, cart.id, product_id, wanted)
            .await?;
        tx.commit().await?;

        self.get_cart(&mut *conn, tenant_id, customer_id).await
    }

    /// Sets the quantity of a line; zero removes it.
    pub async fn update_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        line_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let mut tx = (&mut *conn).begin().await?;

        let cart = self.cart_repo.get_or_create_cart(&mut *tx, tenant_id, customer_id).await?;
        let product_id = self
            .cart_repo
            .line_product(&mut *tx, tenant_id, cart.id, line_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Cart item".into()))?;

        if quantity == 0 {
            self.cart_repo.delete_line(&mut *tx, tenant_id, cart.id, line_id).await?;
        } else {
            let product = self.sellable_product(&mut *tx, tenant_id, product_id).await?;
            ensure_available(&product, quantity)?;
            self.cart_repo
                .set_product_quantity(&mut *tx, tenant_id, cart.id, product_id, quantity)
                .await?;
        }
        tx.commit().await?;

        self.get_cart(&mut *conn, tenant_id, customer_id).await
    }

    pub async fn remove_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        line_id: Uuid,
    ) -> Result<CartView, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;

        let cart = self.cart_repo.get_or_create_cart(&mut *conn, tenant_id, customer_id).await?;
        let removed = self.cart_repo.delete_line(&mut *conn, tenant_id, cart.id, line_id).await?;
        if removed == 0 {
            return Err(AppError::ResourceNotFound("Cart item".into()));
        }

        self.get_cart(&mut *conn, tenant_id, customer_id).await
    }

    pub async fn clear_cart<'e, E>(&self, executor: E, tenant_id: Uuid, customer_id: Uuid) -> Result<CartView, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;

        let cart = self.cart_repo.get_or_create_cart(&mut *conn, tenant_id, customer_id).await?;
        self.cart_repo.clear(&mut *conn, tenant_id, cart.id).await?;

        self.get_cart(&mut *conn, tenant_id, customer_id).await
    }

    pub(crate) async fn sellable_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = self
            .catalog_repo
            .find_product(executor, tenant_id, product_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Product".into()))?;

        if !product.is_sellable() {
            return Err(AppError::ProductUnavailable(product.name));
        }
        Ok(product)
    }
}

pub(crate) fn ensure_available(product: &Product, quantity: i32) -> Result<(), AppError> {
    if quantity > product.available() {
        return Err(AppError::InsufficientStock {
            sku: product.sku.clone(),
            available: product.available(),
        });
    }
    Ok(())
}

/// Live preview of what checkout would charge with flat-rate shipping.
/// Lines whose product is no longer active do not count.
pub fn cart_totals(lines: &[CartLine], settings: &TenantSettings) -> CartTotals {
    let purchasable = lines.iter().filter(|l| l.product_status == ProductStatus::Active);

    let mut items_count = 0;
    let mut amounts = LineAmounts::ZERO;
    for line in purchasable {
        items_count += line.quantity;
        amounts = amounts.add(totals::order_line(line.price, line.quantity, Decimal::ZERO, settings.tax_rate));
    }

    let shipping_estimate = if items_count == 0 {
        Decimal::ZERO
    } else {
        totals::shipping_for(ShippingMethod::FlatRate, amounts.subtotal, settings).unwrap_or(Decimal::ZERO)
    };

    CartTotals {
        items_count,
        subtotal: amounts.subtotal,
        tax_amount: amounts.tax,
        shipping_estimate,
        grand_total: totals::grand_total(amounts.subtotal, amounts.discount, amounts.tax, shipping_estimate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn line(price: i64, quantity: i32, status: ProductStatus) -> CartLine {
        CartLine {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            sku: "SKU".into(),
            name: "Thing".into(),
            slug: "thing".into(),
            price: Decimal::new(price, 2),
            quantity,
            available: 10,
            product_status: status,
        }
    }

    fn settings(threshold: Option<i64>) -> TenantSettings {
        let mut s = TenantSettings::defaults(Uuid::nil());
        s.tax_rate = Decimal::from(18);
        s.flat_shipping_rate = Decimal::from(49);
        s.free_shipping_threshold = threshold.map(Decimal::from);
        s
    }

    #[test]
    fn empty_cart_has_no_shipping() {
        let totals = cart_totals(&[], &settings(None));
        assert_eq!(totals.items_count, 0);
        assert_eq!(totals.grand_total, Decimal::ZERO);
    }

    #[rstest]
    #[case(None, Decimal::from(49))]
    #[case(Some(1000), Decimal::from(49))]
    #[case(Some(500), Decimal::ZERO)]
    fn shipping_estimate_honours_threshold(#[case] threshold: Option<i64>, #[case] expected: Decimal) {
        // 2 x 299.00 = 598.00
        let lines = vec![line(29900, 2, ProductStatus::Active)];
        let totals = cart_totals(&lines, &settings(threshold));
        assert_eq!(totals.subtotal, Decimal::new(59800, 2));
        assert_eq!(totals.tax_amount, Decimal::new(10764, 2));
        assert_eq!(totals.shipping_estimate, expected);
        assert_eq!(totals.grand_total, Decimal::new(70564, 2) + expected);
    }

    #[test]
    fn archived_lines_are_left_out() {
        let lines = vec![
            line(10000, 1, ProductStatus::Active),
            line(50000, 3, ProductStatus::Archived),
        ];
        let totals = cart_totals(&lines, &settings(None));
        assert_eq!(totals.items_count, 1);
        assert_eq!(totals.subtotal, Decimal::from(100));
    }

    #[test]
    fn requested_quantity_is_checked_against_free_stock() {
        let product = Product {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            category_id: None,
            sku: "MUG-1".into(),
            name: "Mug".into(),
            slug: "mug".into(),
            description: None,
            price: Decimal::from(250),
            stock_quantity: 5,
            reserved_quantity: 3,
            status: ProductStatus::Active,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(ensure_available(&product, 2).is_ok());
        let err = ensure_available(&product, 3).unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { available: 2, .. }));
    }
}
