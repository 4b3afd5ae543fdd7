// src/services/invoice_service.rs

use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::{error::AppError, numbering::document_number, response::Paginated},
    db::{InvoiceRepository, NewTransaction, OrderRepository, SettingsRepository, TransactionRepository},
    models::{
        billing::{
            CreateInvoicePayload, Invoice, InvoiceDetail, InvoiceListQuery, TransactionKind, TransactionStatus,
        },
        sales::{InvoiceStatus, Order, OrderStatus},
    },
    services::{
        document_service::{DocumentService, RenderedDocument},
        order_service::lock_order,
        totals::{self, LineAmounts},
    },
};

/// The first invoice that is not cancelled carries the whole shipping charge.
pub fn invoice_shipping(order: &Order, has_active_invoice: bool) -> Decimal {
    if has_active_invoice {
        Decimal::ZERO
    } else {
        order.shipping_amount
    }
}

/// Captured money leaves only through a credit memo, so paid invoices stay.
pub fn ensure_cancellable(status: InvoiceStatus) -> Result<(), AppError> {
    match status {
        InvoiceStatus::Pending => Ok(()),
        InvoiceStatus::Paid => Err(AppError::InvoiceAlreadyPaid),
        InvoiceStatus::Cancelled => Err(AppError::InvoiceNotPending(status)),
    }
}

#[derive(Clone)]
pub struct InvoiceService {
    invoice_repo: InvoiceRepository,
    order_repo: OrderRepository,
    transaction_repo: TransactionRepository,
    settings_repo: SettingsRepository,
    documents: DocumentService,
}

impl InvoiceService {
    pub fn new(
        invoice_repo: InvoiceRepository,
        order_repo: OrderRepository,
        transaction_repo: TransactionRepository,
        settings_repo: SettingsRepository,
        documents: DocumentService,
    ) -> Self {
        Self {
            invoice_repo,
            order_repo,
            transaction_repo,
            settings_repo,
            documents,
        }
    }

    /// Bills the requested units (every invoiceable unit when none are listed).
    /// The first invoice that is not cancelled carries the shipping charge.
    pub async fn create_invoice<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        payload: &CreateInvoicePayload,
    ) -> Result<InvoiceDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let order = lock_order(&self.order_repo, &mut *tx, tenant_id, order_id).await?;
        if !order.status.accepts_invoices() {
            return Err(AppError::OrderStateConflict(order.status));
        }

        let items = self.order_repo.list_items(&mut *tx, tenant_id, order.id).await?;
        let selection = totals::select_quantities(&items, payload.items.as_deref(), |i| i.qty_to_invoice())?;
        if selection.is_empty() {
            return Err(AppError::NothingToInvoice);
        }

        let portions: Vec<_> = selection
            .iter()
            .map(|(item, qty)| (*item, *qty, totals::item_portion(item, item.qty_invoiced, *qty)))
            .collect();
        let lines = portions
            .iter()
            .fold(LineAmounts::ZERO, |acc, (_, _, amounts)| acc.add(*amounts));

        let has_active_invoice = self.invoice_repo.has_active_invoice(&mut *tx, tenant_id, order.id).await?;
        let shipping = invoice_shipping(&order, has_active_invoice);
        let grand_total = totals::grand_total(lines.subtotal, lines.discount, lines.tax, shipping);

        let number = document_number("INV");
        let invoice = self
            .invoice_repo
            .insert(&mut *tx, tenant_id, order.id, &number, lines, shipping, grand_total, payload.notes.as_deref())
            .await?;

        let mut invoice_items = Vec::with_capacity(portions.len());
        for (item, qty, amounts) in portions {
            invoice_items.push(self.invoice_repo.insert_item(&mut *tx, &invoice, item, qty, amounts).await?);

            let mut updated = item.clone();
            updated.qty_invoiced += qty;
            self.order_repo.save_item_quantities(&mut *tx, &updated).await?;
        }

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            invoice_id = %invoice.id,
            grand_total = %invoice.grand_total,
            "invoice created"
        );

        Ok(InvoiceDetail {
            header: invoice,
            order_number: order.order_number,
            items: invoice_items,
        })
    }

    /// Captures the invoice amount. Money already collected on the order (e.g. a
    /// recorded cash payment) is not captured twice.
    pub async fn mark_paid<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
        gateway_reference: Option<&str>,
    ) -> Result<InvoiceDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let (mut order, invoice) = self.lock_with_order(&mut *tx, tenant_id, invoice_id).await?;
        if invoice.status != InvoiceStatus::Pending {
            return Err(AppError::InvoiceNotPending(invoice.status));
        }

        let invoice = self
            .invoice_repo
            .set_status(&mut *tx, tenant_id, invoice.id, InvoiceStatus::Paid)
            .await?;

        let captured = invoice.grand_total.min(order.outstanding());
        if captured > Decimal::ZERO {
            self.transaction_repo
                .settle_pending_authorizations(&mut *tx, tenant_id, order.id, TransactionStatus::Success)
                .await?;
            self.transaction_repo
                .insert(
                    &mut *tx,
                    tenant_id,
                    &NewTransaction {
                        order_id: order.id,
                        invoice_id: Some(invoice.id),
                        credit_memo_id: None,
                        kind: TransactionKind::Capture,
                        status: TransactionStatus::Success,
                        amount: captured,
                        payment_method: order.payment_method,
                        gateway_reference,
                        notes: None,
                    },
                )
                .await?;
            order.total_paid += captured;
        }

        order.payment_status =
            totals::derive_payment_status(order.grand_total, order.total_paid, order.total_refunded, order.payment_status);
        if order.status == OrderStatus::Pending {
            order.status = OrderStatus::Processing;
        }
        let order = self.order_repo.save_state(&mut *tx, &order).await?;

        let items = self.invoice_repo.list_items(&mut *tx, tenant_id, invoice.id).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            invoice_id = %invoice.id,
            captured = %captured,
            payment_status = %order.payment_status,
            "invoice paid"
        );

        Ok(InvoiceDetail {
            header: invoice,
            order_number: order.order_number,
            items,
        })
    }

    /// Only pending invoices can be cancelled; their quantities become invoiceable again.
    pub async fn cancel_invoice<'e, E>(&self, executor: E, tenant_id: Uuid, invoice_id: Uuid) -> Result<InvoiceDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let (order, invoice) = self.lock_with_order(&mut *tx, tenant_id, invoice_id).await?;
        ensure_cancellable(invoice.status)?;

        let invoice = self
            .invoice_repo
            .set_status(&mut *tx, tenant_id, invoice.id, InvoiceStatus::Cancelled)
            .await?;

        let lines = self.invoice_repo.list_items(&mut *tx, tenant_id, invoice.id).await?;
        let mut items = self.order_repo.list_items(&mut *tx, tenant_id, order.id).await?;
        for line in &lines {
            if let Some(item) = items.iter_mut().find(|i| i.id == line.order_item_id) {
                item.qty_invoiced = (item.qty_invoiced - line.quantity).max(0);
                self.order_repo.save_item_quantities(&mut *tx, item).await?;
            }
        }

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant_id, order_id = %order.id, invoice_id = %invoice.id, "invoice cancelled");

        Ok(InvoiceDetail {
            header: invoice,
            order_number: order.order_number,
            items: lines,
        })
    }

    pub async fn list_invoices<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        query: &InvoiceListQuery,
    ) -> Result<Paginated<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let params = query.page_params();
        let total = self.invoice_repo.count(&mut *conn, tenant_id, query.status, query.order_id).await?;
        let invoices = self
            .invoice_repo
            .list(&mut *conn, tenant_id, query.status, query.order_id, params.limit(), params.offset())
            .await?;
        Ok(Paginated::new(invoices, total, &params))
    }

    pub async fn get_invoice<'e, E>(&self, executor: E, tenant_id: Uuid, invoice_id: Uuid) -> Result<InvoiceDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        self.load_detail(&mut *conn, tenant_id, invoice_id).await
    }

    pub async fn render_invoice_pdf<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<RenderedDocument, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let detail = self.load_detail(&mut *conn, tenant_id, invoice_id).await?;
        let settings = self.settings_repo.get_settings(&mut *conn, tenant_id).await?;
        let order = self
            .order_repo
            .find(&mut *conn, tenant_id, detail.header.order_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Order".into()))?;

        self.documents.render_invoice(&settings, &order, &detail).await
    }

    async fn load_detail(&self, conn: &mut PgConnection, tenant_id: Uuid, invoice_id: Uuid) -> Result<InvoiceDetail, AppError> {
        let invoice = self
            .invoice_repo
            .find(&mut *conn, tenant_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Invoice".into()))?;
        let order = self
            .order_repo
            .find(&mut *conn, tenant_id, invoice.order_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Order".into()))?;
        let items = self.invoice_repo.list_items(&mut *conn, tenant_id, invoice.id).await?;

        Ok(InvoiceDetail {
            header: invoice,
            order_number: order.order_number,
            items,
        })
    }

    /// Locks the owning order, then re-reads the invoice under that lock.
    async fn lock_with_order(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<(Order, Invoice), AppError> {
        let not_found = || AppError::ResourceNotFound("Invoice".into());

        let order_id = self
            .invoice_repo
            .find(&mut *conn, tenant_id, invoice_id)
            .await?
            .ok_or_else(not_found)?
            .order_id;
        let order = lock_order(&self.order_repo, &mut *conn, tenant_id, order_id).await?;
        let invoice = self
            .invoice_repo
            .find(&mut *conn, tenant_id, invoice_id)
            .await?
            .ok_or_else(not_found)?;
        Ok((order, invoice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    use crate::models::sales::{OrderItem, PaymentMethod, PaymentStatus, ShippingMethod};

    fn order() -> Order {
        Order {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            order_number: "ORD-0000000001".into(),
            customer_id: None,
            customer_email: "ravi@example.com".into(),
            status: OrderStatus::Processing,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Cod,
            shipping_method: ShippingMethod::FlatRate,
            currency: "INR".into(),
            subtotal: Decimal::from(300),
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::from(54),
            shipping_amount: Decimal::from(49),
            grand_total: Decimal::from(403),
            total_paid: Decimal::ZERO,
            total_refunded: Decimal::ZERO,
            shipping_refunded: Decimal::ZERO,
            shipping_address: serde_json::Value::Null,
            billing_address: serde_json::Value::Null,
            notes: None,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(order: &Order) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            order_id: order.id,
            product_id: None,
            sku: "BAG-01".into(),
            name: "Bag".into(),
            price: Decimal::from(100),
            quantity: 3,
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::from(54),
            row_total: Decimal::from(354),
            qty_invoiced: 0,
            qty_shipped: 0,
            qty_refunded: 0,
            qty_cancelled: 0,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(InvoiceStatus::Pending, None)]
    #[case(InvoiceStatus::Paid, Some("INVOICE_ALREADY_PAID"))]
    #[case(InvoiceStatus::Cancelled, Some("INVOICE_NOT_PENDING"))]
    fn only_pending_invoices_can_be_cancelled(#[case] status: InvoiceStatus, #[case] code: Option<&str>) {
        assert_eq!(ensure_cancellable(status).err().map(|e| e.code()), code);
    }

    #[test]
    fn shipping_is_billed_once() {
        let order = order();
        assert_eq!(invoice_shipping(&order, false), Decimal::from(49));
        assert_eq!(invoice_shipping(&order, true), Decimal::ZERO);
    }

    #[test]
    fn split_invoices_add_up_to_the_order() {
        // One unit on the first invoice, two on the second.
        let order = order();
        let line = item(&order);

        let first = totals::item_portion(&line, 0, 1);
        let first_total =
            totals::grand_total(first.subtotal, first.discount, first.tax, invoice_shipping(&order, false));
        let second = totals::item_portion(&line, 1, 2);
        let second_total =
            totals::grand_total(second.subtotal, second.discount, second.tax, invoice_shipping(&order, true));

        assert_eq!(first_total + second_total, order.grand_total);
    }
}
