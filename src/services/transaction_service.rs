// src/services/transaction_service.rs

use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{error::AppError, response::Paginated},
    db::{NewTransaction, OrderRepository, TransactionFilter, TransactionRepository},
    models::{
        billing::{
            RecordFailedPaymentPayload, RecordPaymentPayload, Transaction, TransactionKind, TransactionListQuery,
            TransactionStatus,
        },
        sales::{OrderStatus, PaymentStatus},
    },
    services::{order_service::lock_order, totals},
};

#[derive(Clone)]
pub struct TransactionService {
    transaction_repo: TransactionRepository,
    order_repo: OrderRepository,
}

impl TransactionService {
    pub fn new(transaction_repo: TransactionRepository, order_repo: OrderRepository) -> Self {
        Self { transaction_repo, order_repo }
    }

    /// Manual capture, e.g. cash collected on delivery.
    pub async fn record_payment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        payload: &RecordPaymentPayload,
    ) -> Result<Transaction, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let mut order = lock_order(&self.order_repo, &mut *tx, tenant_id, order_id).await?;
        if order.status.is_closed() {
            return Err(AppError::OrderStateConflict(order.status));
        }

        let amount = totals::round_money(payload.amount);
        let outstanding = order.outstanding();
        if amount <= Decimal::ZERO || amount > outstanding {
            return Err(AppError::PaymentExceedsOutstanding { requested: amount, outstanding });
        }

        let transaction = self
            .transaction_repo
            .insert(
                &mut *tx,
                tenant_id,
                &NewTransaction {
                    order_id: order.id,
                    invoice_id: None,
                    credit_memo_id: None,
                    kind: TransactionKind::Capture,
                    status: TransactionStatus::Success,
                    amount,
                    payment_method: payload.payment_method.unwrap_or(order.payment_method),
                    gateway_reference: payload.gateway_reference.as_deref(),
                    notes: payload.notes.as_deref(),
                },
            )
            .await?;

        order.total_paid += amount;
        if order.outstanding().is_zero() {
            self.transaction_repo
                .settle_pending_authorizations(&mut *tx, tenant_id, order.id, TransactionStatus::Success)
                .await?;
        }
        order.payment_status =
            totals::derive_payment_status(order.grand_total, order.total_paid, order.total_refunded, order.payment_status);
        if order.status == OrderStatus::Pending {
            order.status = OrderStatus::Processing;
        }
        let order = self.order_repo.save_state(&mut *tx, &order).await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            amount = %amount,
            payment_status = %order.payment_status,
            "payment recorded"
        );

        Ok(transaction)
    }

    /// Records a declined payment for the outstanding amount and voids pending authorizations.
    pub async fn record_failed_payment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        payload: &RecordFailedPaymentPayload,
    ) -> Result<Transaction, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let mut order = lock_order(&self.order_repo, &mut *tx, tenant_id, order_id).await?;
        if order.status.is_closed() {
            return Err(AppError::OrderStateConflict(order.status));
        }

        self.transaction_repo
            .settle_pending_authorizations(&mut *tx, tenant_id, order.id, TransactionStatus::Failed)
            .await?;
        let transaction = self
            .transaction_repo
            .insert(
                &mut *tx,
                tenant_id,
                &NewTransaction {
                    order_id: order.id,
                    invoice_id: None,
                    credit_memo_id: None,
                    kind: TransactionKind::Capture,
                    status: TransactionStatus::Failed,
                    amount: order.outstanding(),
                    payment_method: order.payment_method,
                    gateway_reference: payload.gateway_reference.as_deref(),
                    notes: payload.notes.as_deref(),
                },
            )
            .await?;

        if order.total_paid.is_zero() {
            order.payment_status = PaymentStatus::Failed;
            order = self.order_repo.save_state(&mut *tx, &order).await?;
        }

        tx.commit().await?;

        tracing::warn!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            payment_status = %order.payment_status,
            "payment failed"
        );

        Ok(transaction)
    }

    pub async fn list_for_order<'e, E>(&self, executor: E, tenant_id: Uuid, order_id: Uuid) -> Result<Vec<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        if self.order_repo.find(&mut *conn, tenant_id, order_id).await?.is_none() {
            return Err(AppError::ResourceNotFound("Order".into()));
        }
        self.transaction_repo.list_for_order(&mut *conn, tenant_id, order_id).await
    }

    pub async fn list_transactions<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        query: &TransactionListQuery,
    ) -> Result<Paginated<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let params = query.page_params();
        let filter = TransactionFilter {
            kind: query.kind,
            status: query.status,
            order_id: query.order_id,
        };
        let total = self.transaction_repo.count(&mut *conn, tenant_id, filter).await?;
        let transactions = self
            .transaction_repo
            .list(&mut *conn, tenant_id, filter, params.limit(), params.offset())
            .await?;
        Ok(Paginated::new(transactions, total, &params))
    }
}
