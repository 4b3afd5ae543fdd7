// src/db/transaction_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        billing::{Transaction, TransactionKind, TransactionStatus},
        sales::PaymentMethod,
    },
};

const TRANSACTION_COLUMNS: &str = "id, tenant_id, order_id, invoice_id, credit_memo_id, kind, status, amount, \
     payment_method, gateway_reference, notes, created_at";

#[derive(Debug, Clone)]
pub struct NewTransaction<'a> {
    pub order_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub credit_memo_id: Option<Uuid>,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub gateway_reference: Option<&'a str>,
    pub notes: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub order_id: Option<Uuid>,
}

#[derive(Clone, Default)]
pub struct TransactionRepository;

impl TransactionRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert<'e, E>(&self, executor: E, tenant_id: Uuid, tx: &NewTransaction<'_>) -> Result<Transaction, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO transactions (
                tenant_id, order_id, invoice_id, credit_memo_id, kind, status, amount,
                payment_method, gateway_reference, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Transaction>(&sql)
            .bind(tenant_id)
            .bind(tx.order_id)
            .bind(tx.invoice_id)
            .bind(tx.credit_memo_id)
            .bind(tx.kind)
            .bind(tx.status)
            .bind(tx.amount)
            .bind(tx.payment_method)
            .bind(tx.gateway_reference)
            .bind(tx.notes)
            .fetch_one(executor)
            .await?;
        Ok(created)
    }

    pub async fn list_for_order<'e, E>(&self, executor: E, tenant_id: Uuid, order_id: Uuid) -> Result<Vec<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE tenant_id = $1 AND order_id = $2 ORDER BY created_at, id"
        );
        let transactions = sqlx::query_as::<_, Transaction>(&sql)
            .bind(tenant_id)
            .bind(order_id)
            .fetch_all(executor)
            .await?;
        Ok(transactions)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: TransactionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS} FROM transactions
            WHERE tenant_id = $1
              AND ($2::transaction_kind IS NULL OR kind = $2)
              AND ($3::transaction_status IS NULL OR status = $3)
              AND ($4::uuid IS NULL OR order_id = $4)
            ORDER BY created_at DESC, id
            LIMIT $5 OFFSET $6
            "#
        );
        let transactions = sqlx::query_as::<_, Transaction>(&sql)
            .bind(tenant_id)
            .bind(filter.kind)
            .bind(filter.status)
            .bind(filter.order_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await?;
        Ok(transactions)
    }

    pub async fn count<'e, E>(&self, executor: E, tenant_id: Uuid, filter: TransactionFilter) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE tenant_id = $1
              AND ($2::transaction_kind IS NULL OR kind = $2)
              AND ($3::transaction_status IS NULL OR status = $3)
              AND ($4::uuid IS NULL OR order_id = $4)
            "#,
        )
        .bind(tenant_id)
        .bind(filter.kind)
        .bind(filter.status)
        .bind(filter.order_id)
        .fetch_one(executor)
        .await?;
        Ok(total)
    }

    /// Closes the pending authorizations of an order and returns them.
    pub async fn settle_pending_authorizations<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE transactions SET status = $3
            WHERE tenant_id = $1 AND order_id = $2 AND kind = 'authorization' AND status = 'pending'
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let settled = sqlx::query_as::<_, Transaction>(&sql)
            .bind(tenant_id)
            .bind(order_id)
            .bind(status)
            .fetch_all(executor)
            .await?;
        Ok(settled)
    }
}
