// src/db/order_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::sales::{Order, OrderFilter, OrderItem, PaymentMethod, ShippingMethod},
    services::totals::LineAmounts,
};

const ORDER_COLUMNS: &str = "id, tenant_id, order_number, customer_id, customer_email, status, \
     payment_status, payment_method, shipping_method, currency, subtotal, discount_amount, tax_amount, \
     shipping_amount, grand_total, total_paid, total_refunded, shipping_refunded, shipping_address, \
     billing_address, notes, cancelled_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, tenant_id, order_id, product_id, sku, name, price, quantity, \
     discount_amount, tax_amount, row_total, qty_invoiced, qty_shipped, qty_refunded, qty_cancelled, created_at";

const FILTER_CLAUSE: &str = r#"
    tenant_id = $1
    AND ($2::order_status IS NULL OR status = $2)
    AND ($3::payment_status IS NULL OR payment_status = $3)
    AND ($4::uuid IS NULL OR customer_id = $4)
    AND ($5::text IS NULL OR order_number ILIKE '%' || $5 || '%' OR customer_email ILIKE '%' || $5 || '%')
"#;

pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub customer_id: Uuid,
    pub customer_email: &'a str,
    pub payment_method: PaymentMethod,
    pub shipping_method: ShippingMethod,
    pub currency: &'a str,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub grand_total: Decimal,
    pub shipping_address: serde_json::Value,
    pub billing_address: serde_json::Value,
    pub notes: Option<&'a str>,
}

pub struct NewOrderItem<'a> {
    pub product_id: Uuid,
    pub sku: &'a str,
    pub name: &'a str,
    pub price: Decimal,
    pub quantity: i32,
    pub amounts: LineAmounts,
}

#[derive(Clone, Default)]
pub struct OrderRepository;

impl OrderRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert_order<'e, E>(&self, executor: E, tenant_id: Uuid, order: &NewOrder<'_>) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO orders (
                tenant_id, order_number, customer_id, customer_email, payment_method, shipping_method,
                currency, subtotal, discount_amount, tax_amount, shipping_amount, grand_total,
                shipping_address, billing_address, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Order>(&sql)
            .bind(tenant_id)
            .bind(order.order_number)
            .bind(order.customer_id)
            .bind(order.customer_email)
            .bind(order.payment_method)
            .bind(order.shipping_method)
            .bind(order.currency)
            .bind(order.subtotal)
            .bind(order.discount_amount)
            .bind(order.tax_amount)
            .bind(order.shipping_amount)
            .bind(order.grand_total)
            .bind(&order.shipping_address)
            .bind(&order.billing_address)
            .bind(order.notes)
            .fetch_one(executor)
            .await?;
        Ok(created)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        item: &NewOrderItem<'_>,
    ) -> Result<OrderItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO order_items (
                tenant_id, order_id, product_id, sku, name, price, quantity,
                discount_amount, tax_amount, row_total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ITEM_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(tenant_id)
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.sku)
            .bind(item.name)
            .bind(item.price)
            .bind(item.quantity)
            .bind(item.amounts.discount)
            .bind(item.amounts.tax)
            .bind(item.amounts.row_total)
            .fetch_one(executor)
            .await?;
        Ok(created)
    }

    pub async fn find<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = $1 AND id = $2");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(order)
    }

    /// Every write to an order, its items or its documents starts with this lock.
    pub async fn lock<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = $1 AND id = $2 FOR UPDATE");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(order)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE {FILTER_CLAUSE} ORDER BY created_at DESC, id LIMIT $6 OFFSET $7"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(tenant_id)
            .bind(filter.status)
            .bind(filter.payment_status)
            .bind(filter.customer_id)
            .bind(filter.search.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await?;
        Ok(orders)
    }

    pub async fn count<'e, E>(&self, executor: E, tenant_id: Uuid, filter: &OrderFilter) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT COUNT(*) FROM orders WHERE {FILTER_CLAUSE}");
        let total: i64 = sqlx::query_scalar(&sql)
            .bind(tenant_id)
            .bind(filter.status)
            .bind(filter.payment_status)
            .bind(filter.customer_id)
            .bind(filter.search.as_deref())
            .fetch_one(executor)
            .await?;
        Ok(total)
    }

    pub async fn list_items<'e, E>(&self, executor: E, tenant_id: Uuid, order_id: Uuid) -> Result<Vec<OrderItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE tenant_id = $1 AND order_id = $2 ORDER BY created_at, id"
        );
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(tenant_id)
            .bind(order_id)
            .fetch_all(executor)
            .await?;
        Ok(items)
    }

    /// Persists status, payment status and money counters of an order already locked
    /// by the caller.
    pub async fn save_state<'e, E>(&self, executor: E, order: &Order) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE orders SET
                status = $3,
                payment_status = $4,
                total_paid = $5,
                total_refunded = $6,
                shipping_refunded = $7,
                notes = $8,
                cancelled_at = $9,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let saved = sqlx::query_as::<_, Order>(&sql)
            .bind(order.tenant_id)
            .bind(order.id)
            .bind(order.status)
            .bind(order.payment_status)
            .bind(order.total_paid)
            .bind(order.total_refunded)
            .bind(order.shipping_refunded)
            .bind(&order.notes)
            .bind(order.cancelled_at)
            .fetch_one(executor)
            .await?;
        Ok(saved)
    }

    /// Persists the invoiced/shipped/refunded/cancelled counters of a line.
    pub async fn save_item_quantities<'e, E>(&self, executor: E, item: &OrderItem) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE order_items SET
                qty_invoiced = $3,
                qty_shipped = $4,
                qty_refunded = $5,
                qty_cancelled = $6
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(item.tenant_id)
        .bind(item.id)
        .bind(item.qty_invoiced)
        .bind(item.qty_shipped)
        .bind(item.qty_refunded)
        .bind(item.qty_cancelled)
        .execute(executor)
        .await?;
        Ok(())
    }
}
