// src/db/credit_memo_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        billing::{CreditMemo, CreditMemoItem},
        sales::{CreditMemoStatus, OrderItem},
    },
    services::totals::LineAmounts,
};

const MEMO_COLUMNS: &str = "id, tenant_id, order_id, invoice_id, credit_memo_number, status, subtotal, \
     discount_amount, tax_amount, shipping_refund, adjustment_refund, adjustment_fee, grand_total, restock, \
     reason, refunded_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, tenant_id, credit_memo_id, order_item_id, sku, name, price, quantity, \
     discount_amount, tax_amount, row_total";

pub struct NewCreditMemo<'a> {
    pub order_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub credit_memo_number: &'a str,
    pub lines: LineAmounts,
    pub shipping_refund: Decimal,
    pub adjustment_refund: Decimal,
    pub adjustment_fee: Decimal,
    pub grand_total: Decimal,
    pub restock: bool,
    pub reason: Option<&'a str>,
}

/// Money held by open memos of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenMemoTotals {
    pub grand_total: Decimal,
    pub shipping_refund: Decimal,
}

#[derive(Clone, Default)]
pub struct CreditMemoRepository;

impl CreditMemoRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert<'e, E>(&self, executor: E, tenant_id: Uuid, memo: &NewCreditMemo<'_>) -> Result<CreditMemo, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO credit_memos (
                tenant_id, order_id, invoice_id, credit_memo_number, subtotal, discount_amount, tax_amount,
                shipping_refund, adjustment_refund, adjustment_fee, grand_total, restock, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {MEMO_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, CreditMemo>(&sql)
            .bind(tenant_id)
            .bind(memo.order_id)
            .bind(memo.invoice_id)
            .bind(memo.credit_memo_number)
            .bind(memo.lines.subtotal)
            .bind(memo.lines.discount)
            .bind(memo.lines.tax)
            .bind(memo.shipping_refund)
            .bind(memo.adjustment_refund)
            .bind(memo.adjustment_fee)
            .bind(memo.grand_total)
            .bind(memo.restock)
            .bind(memo.reason)
            .fetch_one(executor)
            .await?;
        Ok(created)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        memo: &CreditMemo,
        item: &OrderItem,
        quantity: i32,
        amounts: LineAmounts,
    ) -> Result<CreditMemoItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO credit_memo_items (
                tenant_id, credit_memo_id, order_item_id, sku, name, price, quantity,
                discount_amount, tax_amount, row_total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ITEM_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, CreditMemoItem>(&sql)
            .bind(memo.tenant_id)
            .bind(memo.id)
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

    pub async fn find<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<CreditMemo>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {MEMO_COLUMNS} FROM credit_memos WHERE tenant_id = $1 AND id = $2");
        let memo = sqlx::query_as::<_, CreditMemo>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(memo)
    }

    pub async fn list_for_order<'e, E>(&self, executor: E, tenant_id: Uuid, order_id: Uuid) -> Result<Vec<CreditMemo>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {MEMO_COLUMNS} FROM credit_memos WHERE tenant_id = $1 AND order_id = $2 ORDER BY created_at, id"
        );
        let memos = sqlx::query_as::<_, CreditMemo>(&sql)
            .bind(tenant_id)
            .bind(order_id)
            .fetch_all(executor)
            .await?;
        Ok(memos)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        status: Option<CreditMemoStatus>,
        order_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditMemo>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {MEMO_COLUMNS} FROM credit_memos
            WHERE tenant_id = $1
              AND ($2::credit_memo_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR order_id = $3)
            ORDER BY created_at DESC, id
            LIMIT $4 OFFSET $5
            "#
        );
        let memos = sqlx::query_as::<_, CreditMemo>(&sql)
            .bind(tenant_id)
            .bind(status)
            .bind(order_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await?;
        Ok(memos)
    }

    pub async fn count<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        status: Option<CreditMemoStatus>,
        order_id: Option<Uuid>,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM credit_memos
            WHERE tenant_id = $1
              AND ($2::credit_memo_status IS NULL OR status = $2)
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

    pub async fn list_items<'e, E>(&self, executor: E, tenant_id: Uuid, memo_id: Uuid) -> Result<Vec<CreditMemoItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM credit_memo_items WHERE tenant_id = $1 AND credit_memo_id = $2 ORDER BY sku, id"
        );
        let items = sqlx::query_as::<_, CreditMemoItem>(&sql)
            .bind(tenant_id)
            .bind(memo_id)
            .fetch_all(executor)
            .await?;
        Ok(items)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        status: CreditMemoStatus,
    ) -> Result<CreditMemo, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE credit_memos SET
                status = $3,
                refunded_at = CASE WHEN $3 = 'refunded'::credit_memo_status THEN NOW() ELSE refunded_at END,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {MEMO_COLUMNS}
            "#
        );
        let memo = sqlx::query_as::<_, CreditMemo>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(status)
            .fetch_one(executor)
            .await?;
        Ok(memo)
    }

    pub async fn open_totals<'e, E>(&self, executor: E, tenant_id: Uuid, order_id: Uuid) -> Result<OpenMemoTotals, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (grand_total, shipping_refund): (Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(grand_total), 0), COALESCE(SUM(shipping_refund), 0)
            FROM credit_memos
            WHERE tenant_id = $1 AND order_id = $2 AND status = 'open'
            "#,
        )
        .bind(tenant_id)
        .bind(order_id)
        .fetch_one(executor)
        .await?;
        Ok(OpenMemoTotals { grand_total, shipping_refund })
    }

    /// Units per order line held by open memos.
    pub async fn open_item_quantities<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<HashMap<Uuid, i32>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT cmi.order_item_id, SUM(cmi.quantity)::BIGINT
            FROM credit_memo_items cmi
            JOIN credit_memos cm ON cm.id = cmi.credit_memo_id
            WHERE cm.tenant_id = $1 AND cm.order_id = $2 AND cm.status = 'open'
            GROUP BY cmi.order_item_id
            "#,
        )
        .bind(tenant_id)
        .bind(order_id)
        .fetch_all(executor)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(item_id, qty)| (item_id, i32::try_from(qty).unwrap_or(i32::MAX)))
            .collect())
    }
}
