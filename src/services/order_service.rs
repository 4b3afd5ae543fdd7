// src/services/order_service.rs

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        response::{PageParams, Paginated},
    },
    db::{
        CatalogRepository, CreditMemoRepository, InvoiceRepository, NewTransaction, OrderRepository,
        ShipmentRepository, TransactionRepository,
    },
    models::{
        billing::{TransactionKind, TransactionStatus},
        sales::{InvoiceStatus, Order, OrderDetail, OrderFilter, OrderItem, OrderListQuery, OrderStatus},
    },
};

/// Locks the order row for the rest of the transaction.
pub(crate) async fn lock_order(
    repo: &OrderRepository,
    conn: &mut PgConnection,
    tenant_id: Uuid,
    order_id: Uuid,
) -> Result<Order, AppError> {
    repo.lock(conn, tenant_id, order_id)
        .await?
        .ok_or_else(|| AppError::ResourceNotFound("Order".into()))
}

pub(crate) fn append_note(notes: Option<String>, line: &str) -> Option<String> {
    match notes {
        Some(existing) if !existing.trim().is_empty() => Some(format!("{existing}\n{line}")),
        _ => Some(line.to_string()),
    }
}

/// Why the order cannot be cancelled, if anything stands in the way.
pub fn cancel_blocker(order: &Order, items: &[OrderItem]) -> Option<String> {
    if !order.status.is_cancellable() {
        return Some(format!("the order is {}", order.status));
    }
    if items.iter().any(|i| i.qty_shipped > 0) {
        return Some("items have already shipped".into());
    }
    if order.total_paid > Decimal::ZERO {
        return Some("payments were captured, issue a credit memo instead".into());
    }
    None
}

#[derive(Clone)]
pub struct OrderService {
    order_repo: OrderRepository,
    catalog_repo: CatalogRepository,
    invoice_repo: InvoiceRepository,
    shipment_repo: ShipmentRepository,
    credit_memo_repo: CreditMemoRepository,
    transaction_repo: TransactionRepository,
}

impl OrderService {
    pub fn new(
        order_repo: OrderRepository,
        catalog_repo: CatalogRepository,
        invoice_repo: InvoiceRepository,
        shipment_repo: ShipmentRepository,
        credit_memo_repo: CreditMemoRepository,
        transaction_repo: TransactionRepository,
    ) -> Self {
        Self {
            order_repo,
            catalog_repo,
            invoice_repo,
            shipment_repo,
            credit_memo_repo,
            transaction_repo,
        }
    }

    // --- BACK-OFFICE ---

    pub async fn list_orders<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        query: &OrderListQuery,
    ) -> Result<Paginated<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        self.paginate(executor, tenant_id, &query.filter(), &query.page_params()).await
    }

    pub async fn get_order_detail<'e, E>(&self, executor: E, tenant_id: Uuid, order_id: Uuid) -> Result<OrderDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let order = self
            .order_repo
            .find(&mut *conn, tenant_id, order_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Order".into()))?;
        self.load_detail(&mut *conn, order).await
    }

    /// Manual status change. Cancelling goes through the cancel rules.
    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        next: OrderStatus,
        notes: Option<&str>,
    ) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let mut order = lock_order(&self.order_repo, &mut *tx, tenant_id, order_id).await?;

        let order = if next == OrderStatus::Cancelled && order.status.is_cancellable() {
            self.cancel_locked(&mut *tx, order, notes).await?
        } else {
            if !order.status.can_transition_to(next) || next == OrderStatus::Cancelled {
                return Err(AppError::InvalidStatusTransition { from: order.status, to: next });
            }
            let previous = order.status;
            order.status = next;
            if let Some(note) = notes.filter(|n| !n.trim().is_empty()) {
                order.notes = append_note(order.notes.take(), note);
            }
            let saved = self.order_repo.save_state(&mut *tx, &order).await?;
            tracing::info!(
                tenant_id = %tenant_id,
                order_id = %order_id,
                from = %previous,
                to = %next,
                "order status changed"
            );
            saved
        };

        tx.commit().await?;
        Ok(order)
    }

    pub async fn cancel_order<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        reason: Option<&str>,
    ) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let order = lock_order(&self.order_repo, &mut *tx, tenant_id, order_id).await?;
        let order = self.cancel_locked(&mut *tx, order, reason).await?;
        tx.commit().await?;
        Ok(order)
    }

    // --- STOREFRONT ---

    pub async fn list_customer_orders<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        params: &PageParams,
    ) -> Result<Paginated<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let filter = OrderFilter {
            customer_id: Some(customer_id),
            ..Default::default()
        };
        self.paginate(executor, tenant_id, &filter, params).await
    }

    /// Someone else's order reads as not found.
    pub async fn get_customer_order<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let order = self
            .order_repo
            .find(&mut *conn, tenant_id, order_id)
            .await?
            .filter(|o| o.customer_id == Some(customer_id))
            .ok_or_else(|| AppError::ResourceNotFound("Order".into()))?;
        self.load_detail(&mut *conn, order).await
    }

    /// Customers may only withdraw orders nobody has started working on.
    pub async fn cancel_customer_order<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        order_id: Uuid,
        reason: Option<&str>,
    ) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let order = lock_order(&self.order_repo, &mut *tx, tenant_id, order_id).await?;

        if order.customer_id != Some(customer_id) {
            return Err(AppError::ResourceNotFound("Order".into()));
        }
        if order.status != OrderStatus::Pending {
            return Err(AppError::OrderNotCancellable(format!("the order is {}", order.status)));
        }

        let order = self.cancel_locked(&mut *tx, order, reason).await?;
        tx.commit().await?;
        Ok(order)
    }

    // --- INTERNALS ---

    async fn paginate<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &OrderFilter,
        params: &PageParams,
    ) -> Result<Paginated<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let total = self.order_repo.count(&mut *conn, tenant_id, filter).await?;
        let orders = self
            .order_repo
            .list(&mut *conn, tenant_id, filter, params.limit(), params.offset())
            .await?;
        Ok(Paginated::new(orders, total, params))
    }

    async fn load_detail(&self, conn: &mut PgConnection, order: Order) -> Result<OrderDetail, AppError> {
        let tenant_id = order.tenant_id;
        let items = self.order_repo.list_items(&mut *conn, tenant_id, order.id).await?;
        let invoices = self.invoice_repo.list_for_order(&mut *conn, tenant_id, order.id).await?;
        let shipments = self.shipment_repo.list_for_order(&mut *conn, tenant_id, order.id).await?;
        let credit_memos = self.credit_memo_repo.list_for_order(&mut *conn, tenant_id, order.id).await?;
        let transactions = self.transaction_repo.list_for_order(&mut *conn, tenant_id, order.id).await?;

        Ok(OrderDetail {
            header: order,
            items,
            invoices,
            shipments,
            credit_memos,
            transactions,
        })
    }

    /// Cancels an order the caller already locked: pending invoices are dropped,
    /// open units are released from the reservation and authorizations are voided.
    async fn cancel_locked(
        &self,
        conn: &mut PgConnection,
        mut order: Order,
        reason: Option<&str>,
    ) -> Result<Order, AppError> {
        let tenant_id = order.tenant_id;
        let mut items = self.order_repo.list_items(&mut *conn, tenant_id, order.id).await?;

        if let Some(blocker) = cancel_blocker(&order, &items) {
            return Err(AppError::OrderNotCancellable(blocker));
        }

        // Pending invoices give their quantities back.
        for invoice in self.invoice_repo.list_for_order(&mut *conn, tenant_id, order.id).await? {
            if invoice.status != InvoiceStatus::Pending {
                continue;
            }
            self.invoice_repo
                .set_status(&mut *conn, tenant_id, invoice.id, InvoiceStatus::Cancelled)
                .await?;
            for line in self.invoice_repo.list_items(&mut *conn, tenant_id, invoice.id).await? {
                if let Some(item) = items.iter_mut().find(|i| i.id == line.order_item_id) {
                    item.qty_invoiced = (item.qty_invoiced - line.quantity).max(0);
                }
            }
        }

        let mut product_ids: Vec<Uuid> = items.iter().filter_map(|i| i.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        self.catalog_repo.lock_products(&mut *conn, tenant_id, &product_ids).await?;

        for item in items.iter_mut() {
            let open = (item.quantity - item.qty_shipped - item.qty_refunded - item.qty_cancelled).max(0);
            if open > 0 {
                if let Some(product_id) = item.product_id {
                    self.catalog_repo
                        .apply_stock_movement(&mut *conn, tenant_id, product_id, 0, -open)
                        .await?;
                }
                item.qty_cancelled += open;
            }
            self.order_repo.save_item_quantities(&mut *conn, item).await?;
        }

        let voided = self
            .transaction_repo
            .settle_pending_authorizations(&mut *conn, tenant_id, order.id, TransactionStatus::Failed)
            .await?;
        for authorization in &voided {
            self.transaction_repo
                .insert(
                    &mut *conn,
                    tenant_id,
                    &NewTransaction {
                        order_id: order.id,
                        invoice_id: None,
                        credit_memo_id: None,
                        kind: TransactionKind::Void,
                        status: TransactionStatus::Success,
                        amount: authorization.amount,
                        payment_method: authorization.payment_method,
                        gateway_reference: authorization.gateway_reference.as_deref(),
                        notes: Some("Authorization voided on cancellation"),
                    },
                )
                .await?;
        }

        order.status = OrderStatus::Cancelled;
        order.cancelled_at = Some(Utc::now());
        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            order.notes = append_note(order.notes.take(), &format!("Cancelled: {reason}"));
        }
        let saved = self.order_repo.save_state(&mut *conn, &order).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            voided_authorizations = voided.len(),
            "order cancelled"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sales::{PaymentMethod, PaymentStatus, ShippingMethod};
    use rstest::rstest;

    fn order(status: OrderStatus, paid: i64) -> Order {
        Order {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            order_number: "ORD-1".into(),
            customer_id: None,
            customer_email: "asha@example.com".into(),
            status,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Cod,
            shipping_method: ShippingMethod::FlatRate,
            currency: "INR".into(),
            subtotal: Decimal::from(100),
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            shipping_amount: Decimal::ZERO,
            grand_total: Decimal::from(100),
            total_paid: Decimal::from(paid),
            total_refunded: Decimal::ZERO,
            shipping_refunded: Decimal::ZERO,
            shipping_address: serde_json::json!({}),
            billing_address: serde_json::json!({}),
            notes: None,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(shipped: i32) -> OrderItem {
        OrderItem {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            order_id: Uuid::nil(),
            product_id: None,
            sku: "SKU".into(),
            name: "Thing".into(),
            price: Decimal::from(50),
            quantity: 2,
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            row_total: Decimal::from(100),
            qty_invoiced: 0,
            qty_shipped: shipped,
            qty_refunded: 0,
            qty_cancelled: 0,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(OrderStatus::Pending, 0, 0, true)]
    #[case(OrderStatus::OnHold, 0, 0, true)]
    #[case(OrderStatus::Processing, 0, 1, false)]
    #[case(OrderStatus::Processing, 100, 0, false)]
    #[case(OrderStatus::Shipped, 0, 0, false)]
    #[case(OrderStatus::Cancelled, 0, 0, false)]
    fn cancellation_rules(#[case] status: OrderStatus, #[case] paid: i64, #[case] shipped: i32, #[case] allowed: bool) {
        let blocker = cancel_blocker(&order(status, paid), &[item(shipped)]);
        assert_eq!(blocker.is_none(), allowed, "{blocker:?}");
    }

    #[test]
    fn paid_orders_point_to_credit_memos() {
        let blocker = cancel_blocker(&order(OrderStatus::Processing, 100), &[item(0)]).unwrap();
        assert!(blocker.contains("credit memo"));
    }

    #[test]
    fn notes_are_appended() {
        assert_eq!(append_note(None, "a").as_deref(), Some("a"));
        assert_eq!(append_note(Some("a".into()), "b").as_deref(), Some("a\nb"));
        assert_eq!(append_note(Some(" ".into()), "b").as_deref(), Some("b"));
    }
}
