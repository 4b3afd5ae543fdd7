// src/db/invoice_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        billing::{Invoice, InvoiceItem},
        sales::{InvoiceStatus, OrderItem},
    },
    services::totals::LineAmounts,
};

const INVOICE_COLUMNS: &str = "id, tenant_id, order_id, invoice_number, status, subtotal, discount_amount, \
     tax_amount, shipping_amount, grand_total, notes, paid_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, tenant_id, invoice_id, order_item_id, sku, name, price, quantity, \
     discount_amount, tax_amount, row_total";

#[derive(Clone, Default)]
pub struct InvoiceRepository;

impl InvoiceRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        invoice_number: &str,
        lines: LineAmounts,
        shipping_amount: Decimal,
        grand_total: Decimal,
        notes: Option<&str>,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO invoices (
                tenant_id, order_id, invoice_number, subtotal, discount_amount, tax_amount,
                shipping_amount, grand_total, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {INVOICE_COLUMNS}
            "#
        );
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(tenant_id)
            .bind(order_id)
            .bind(invoice_number)
            .bind(lines.subtotal)
            .bind(lines.discount)
            .bind(lines.tax)
            .bind(shipping_amount)
            .bind(grand_total)
            .bind(notes)
            .fetch_one(executor)
            .await?;
        Ok(invoice)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        invoice: &Invoice,
        item: &OrderItem,
        quantity: i32,
        amounts: LineAmounts,
    ) -> Result<InvoiceItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO invoice_items (
                tenant_id, invoice_id, order_item_id, sku, name, price, quantity,
                discount_amount, tax_amount, row_total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ITEM_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, InvoiceItem>(&sql)
            .bind(invoice.tenant_id)
            .bind(invoice.id)
            .bind(item.id)
            .bind(&item.sku)
            .bind(&item.name)
            .bind(item.price)
            .bind(quantity)
            .bind(amounts.discount)
            .bind(amounts.tax)
            .bind(amounts.row_total)
            .fetch_one(executor)
            .await?;
        Ok(created)
    }

    pub async fn find<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE tenant_id = $1 AND id = $2");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(invoice)
    }

    pub async fn list_for_order<'e, E>(&self, executor: E, tenant_id: Uuid, order_id: Uuid) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE tenant_id = $1 AND order_id = $2 ORDER BY created_at, id"
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(tenant_id)
            .bind(order_id)
            .fetch_all(executor)
            .await?;
        Ok(invoices)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        status: Option<InvoiceStatus>,
        order_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE tenant_id = $1
              AND ($2::invoice_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR order_id = $3)
            ORDER BY created_at DESC, id
            LIMIT $4 OFFSET $5
            "#
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(tenant_id)
            .bind(status)
            .bind(order_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await?;
        Ok(invoices)
    }

    pub async fn count<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        status: Option<InvoiceStatus>,
        order_id: Option<Uuid>,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM invoices
            WHERE tenant_id = $1
              AND ($2::invoice_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR order_id = $3)
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(order_id)
        .fetch_one(executor)
        .await?;
        Ok(total)
    }

    pub async fn list_items<'e, E>(&self, executor: E, tenant_id: Uuid, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM invoice_items WHERE tenant_id = $1 AND invoice_id = $2 ORDER BY sku, id"
        );
        let items = sqlx::query_as::<_, InvoiceItem>(&sql)
            .bind(tenant_id)
            .bind(invoice_id)
            .fetch_all(executor)
            .await?;
        Ok(items)
    }

    /// Whether the order already has an invoice that is not cancelled (and so carries the shipping).
    pub async fn has_active_invoice<'e, E>(&self, executor: E, tenant_id: Uuid, order_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invoices
                WHERE tenant_id = $1 AND order_id = $2 AND status <> 'cancelled'
            )
            "#,
        )
        .bind(tenant_id)
        .bind(order_id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE invoices SET
                status = $3,
                paid_at = CASE WHEN $3 = 'paid'::invoice_status THEN NOW() ELSE paid_at END,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {INVOICE_COLUMNS}
            "#
        );
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(status)
            .fetch_one(executor)
            .await?;
        Ok(invoice)
    }
}
