// src/services/credit_memo_service.rs

use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    common::{error::AppError, numbering::document_number, response::Paginated},
    db::{
        CatalogRepository, CreditMemoRepository, InvoiceRepository, NewCreditMemo, NewTransaction, OpenMemoTotals,
        OrderRepository, SettingsRepository, TransactionRepository,
    },
    models::{
        billing::{
            CreateCreditMemoPayload, CreditMemo, CreditMemoDetail, CreditMemoListQuery, RefundPreview, RefundableItem,
            TransactionKind, TransactionStatus,
        },
        sales::{CreditMemoStatus, Order, OrderItem, OrderStatus},
    },
    services::{
        document_service::{DocumentService, RenderedDocument},
        order_service::lock_order,
        shipment_service::status_after_shipment,
        totals::{self, LineAmounts},
    },
};

/// Units of a line still free to refund once open memos are accounted for.
fn refundable_qty(item: &OrderItem, open: &HashMap<Uuid, i32>) -> i32 {
    (item.qty_to_refund() - open.get(&item.id).copied().unwrap_or(0)).max(0)
}

/// Refund amounts requested for a new memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoAmounts {
    pub lines: LineAmounts,
    pub shipping_refund: Decimal,
    pub adjustment_refund: Decimal,
    pub adjustment_fee: Decimal,
}

/// Grand total of a new memo. Shipping and money ceilings subtract what open memos
/// already hold.
pub fn memo_grand_total(order: &Order, open: OpenMemoTotals, amounts: MemoAmounts) -> Result<Decimal, AppError> {
    let shipping_max = totals::shipping_refundable(order.shipping_amount, order.shipping_refunded, open.shipping_refund);
    if amounts.shipping_refund > shipping_max {
        return Err(AppError::RefundExceedsMaximum { requested: amounts.shipping_refund, max: shipping_max });
    }

    let grand_total = totals::credit_memo_total(
        amounts.lines,
        amounts.shipping_refund,
        amounts.adjustment_refund,
        amounts.adjustment_fee,
    );
    if grand_total <= Decimal::ZERO {
        return Err(AppError::NothingToRefund);
    }

    let max = totals::max_refundable(order.total_paid, order.total_refunded, open.grand_total);
    if grand_total > max {
        return Err(AppError::RefundExceedsMaximum { requested: grand_total, max });
    }
    Ok(grand_total)
}

/// Order status once a refund is booked. A processing order whose last unshipped
/// units were refunded has nothing left to ship.
pub fn status_after_refund(order: &Order, items: &[OrderItem]) -> OrderStatus {
    if order.total_refunded >= order.grand_total {
        return OrderStatus::Refunded;
    }
    let anything_shipped = items.iter().any(|i| i.qty_shipped > 0);
    if order.status == OrderStatus::Processing && anything_shipped {
        return status_after_shipment(items);
    }
    order.status
}

#[derive(Clone)]
pub struct CreditMemoService {
    credit_memo_repo: CreditMemoRepository,
    order_repo: OrderRepository,
    invoice_repo: InvoiceRepository,
    catalog_repo: CatalogRepository,
    transaction_repo: TransactionRepository,
    settings_repo: SettingsRepository,
    documents: DocumentService,
}

impl CreditMemoService {
    pub fn new(
        credit_memo_repo: CreditMemoRepository,
        order_repo: OrderRepository,
        invoice_repo: InvoiceRepository,
        catalog_repo: CatalogRepository,
        transaction_repo: TransactionRepository,
        settings_repo: SettingsRepository,
        documents: DocumentService,
    ) -> Self {
        Self {
            credit_memo_repo,
            order_repo,
            invoice_repo,
            catalog_repo,
            transaction_repo,
            settings_repo,
            documents,
        }
    }

    pub async fn refund_preview<'e, E>(&self, executor: E, tenant_id: Uuid, order_id: Uuid) -> Result<RefundPreview, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let order = self
            .order_repo
            .find(&mut *conn, tenant_id, order_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Order".into()))?;
        let items = self.order_repo.list_items(&mut *conn, tenant_id, order.id).await?;
        let open_qty = self.credit_memo_repo.open_item_quantities(&mut *conn, tenant_id, order.id).await?;
        let open = self.credit_memo_repo.open_totals(&mut *conn, tenant_id, order.id).await?;

        let items = items
            .into_iter()
            .map(|item| RefundableItem {
                qty_in_open_memos: open_qty.get(&item.id).copied().unwrap_or(0),
                qty_refundable: refundable_qty(&item, &open_qty),
                order_item_id: item.id,
                sku: item.sku,
                name: item.name,
                price: item.price,
                quantity: item.quantity,
                qty_refunded: item.qty_refunded,
            })
            .collect();

        Ok(RefundPreview {
            order_id: order.id,
            items,
            shipping_refundable: totals::shipping_refundable(
                order.shipping_amount,
                order.shipping_refunded,
                open.shipping_refund,
            ),
            max_refundable: totals::max_refundable(order.total_paid, order.total_refunded, open.grand_total),
        })
    }

    /// Ceilings count the money and units already held by open memos, so two memos
    /// can never refund the same thing.
    pub async fn create_credit_memo<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        payload: &CreateCreditMemoPayload,
    ) -> Result<CreditMemoDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let order = lock_order(&self.order_repo, &mut *tx, tenant_id, order_id).await?;
        if order.status.is_closed() {
            return Err(AppError::OrderStateConflict(order.status));
        }

        if let Some(invoice_id) = payload.invoice_id {
            let belongs = self
                .invoice_repo
                .find(&mut *tx, tenant_id, invoice_id)
                .await?
                .is_some_and(|invoice| invoice.order_id == order.id);
            if !belongs {
                return Err(AppError::ResourceNotFound("Invoice".into()));
            }
        }

        let items = self.order_repo.list_items(&mut *tx, tenant_id, order.id).await?;
        let open_qty = self.credit_memo_repo.open_item_quantities(&mut *tx, tenant_id, order.id).await?;
        let open = self.credit_memo_repo.open_totals(&mut *tx, tenant_id, order.id).await?;

        let selection = totals::select_quantities(&items, Some(payload.items.as_slice()), |i| refundable_qty(i, &open_qty))?;
        let portions: Vec<_> = selection
            .iter()
            .map(|(item, qty)| {
                let processed = item.qty_refunded + open_qty.get(&item.id).copied().unwrap_or(0);
                (*item, *qty, totals::item_portion(item, processed, *qty))
            })
            .collect();
        let lines = portions
            .iter()
            .fold(LineAmounts::ZERO, |acc, (_, _, amounts)| acc.add(*amounts));

        let amounts = MemoAmounts {
            lines,
            shipping_refund: totals::round_money(payload.shipping_refund.unwrap_or(Decimal::ZERO)),
            adjustment_refund: totals::round_money(payload.adjustment_refund.unwrap_or(Decimal::ZERO)),
            adjustment_fee: totals::round_money(payload.adjustment_fee.unwrap_or(Decimal::ZERO)),
        };
        let grand_total = memo_grand_total(&order, open, amounts)?;

        let number = document_number("CM");
        let memo = self
            .credit_memo_repo
            .insert(
                &mut *tx,
                tenant_id,
                &NewCreditMemo {
                    order_id: order.id,
                    invoice_id: payload.invoice_id,
                    credit_memo_number: &number,
                    lines,
                    shipping_refund: amounts.shipping_refund,
                    adjustment_refund: amounts.adjustment_refund,
                    adjustment_fee: amounts.adjustment_fee,
                    grand_total,
                    restock: payload.restock,
                    reason: payload.reason.as_deref(),
                },
            )
            .await?;

        let mut memo_items = Vec::with_capacity(portions.len());
        for (item, qty, amounts) in portions {
            memo_items.push(self.credit_memo_repo.insert_item(&mut *tx, &memo, item, qty, amounts).await?);
        }

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            credit_memo_id = %memo.id,
            grand_total = %memo.grand_total,
            "credit memo created"
        );

        let (order, memo) = if payload.refund_now.unwrap_or(true) {
            self.apply_refund(&mut *tx, order, memo).await?
        } else {
            (order, memo)
        };

        tx.commit().await?;

        Ok(CreditMemoDetail {
            header: memo,
            order_number: order.order_number,
            items: memo_items,
        })
    }

    pub async fn refund_credit_memo<'e, E>(&self, executor: E, tenant_id: Uuid, memo_id: Uuid) -> Result<CreditMemoDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let (order, memo) = self.lock_with_order(&mut *tx, tenant_id, memo_id).await?;
        if memo.status != CreditMemoStatus::Open {
            return Err(AppError::CreditMemoNotOpen(memo.status));
        }

        let (order, memo) = self.apply_refund(&mut *tx, order, memo).await?;
        let items = self.credit_memo_repo.list_items(&mut *tx, tenant_id, memo.id).await?;
        tx.commit().await?;

        Ok(CreditMemoDetail {
            header: memo,
            order_number: order.order_number,
            items,
        })
    }

    pub async fn cancel_credit_memo<'e, E>(&self, executor: E, tenant_id: Uuid, memo_id: Uuid) -> Result<CreditMemoDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let (order, memo) = self.lock_with_order(&mut *tx, tenant_id, memo_id).await?;
        if memo.status != CreditMemoStatus::Open {
            return Err(AppError::CreditMemoNotOpen(memo.status));
        }

        let memo = self
            .credit_memo_repo
            .set_status(&mut *tx, tenant_id, memo.id, CreditMemoStatus::Cancelled)
            .await?;
        let items = self.credit_memo_repo.list_items(&mut *tx, tenant_id, memo.id).await?;
        tx.commit().await?;

        tracing::info!(tenant_id = %tenant_id, order_id = %order.id, credit_memo_id = %memo.id, "credit memo cancelled");

        Ok(CreditMemoDetail {
            header: memo,
            order_number: order.order_number,
            items,
        })
    }

    pub async fn list_credit_memos<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        query: &CreditMemoListQuery,
    ) -> Result<Paginated<CreditMemo>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let params = query.page_params();
        let total = self.credit_memo_repo.count(&mut *conn, tenant_id, query.status, query.order_id).await?;
        let memos = self
            .credit_memo_repo
            .list(&mut *conn, tenant_id, query.status, query.order_id, params.limit(), params.offset())
            .await?;
        Ok(Paginated::new(memos, total, &params))
    }

    pub async fn get_credit_memo<'e, E>(&self, executor: E, tenant_id: Uuid, memo_id: Uuid) -> Result<CreditMemoDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        self.load_detail(&mut *conn, tenant_id, memo_id).await
    }

    pub async fn render_credit_memo_pdf<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        memo_id: Uuid,
    ) -> Result<RenderedDocument, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let detail = self.load_detail(&mut *conn, tenant_id, memo_id).await?;
        let settings = self.settings_repo.get_settings(&mut *conn, tenant_id).await?;
        let order = self
            .order_repo
            .find(&mut *conn, tenant_id, detail.header.order_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Order".into()))?;

        self.documents.render_credit_memo(&settings, &order, &detail).await
    }

    /// Moves the money and the units of an open memo. The order must already be
    /// locked by the caller.
    async fn apply_refund(
        &self,
        conn: &mut PgConnection,
        mut order: Order,
        memo: CreditMemo,
    ) -> Result<(Order, CreditMemo), AppError> {
        let tenant_id = order.tenant_id;
        let lines = self.credit_memo_repo.list_items(&mut *conn, tenant_id, memo.id).await?;
        let mut items = self.order_repo.list_items(&mut *conn, tenant_id, order.id).await?;

        let mut product_ids: Vec<Uuid> = items
            .iter()
            .filter(|i| lines.iter().any(|l| l.order_item_id == i.id))
            .filter_map(|i| i.product_id)
            .collect();
        product_ids.sort();
        product_ids.dedup();
        self.catalog_repo.lock_products(&mut *conn, tenant_id, &product_ids).await?;

        for line in &lines {
            let Some(item) = items.iter_mut().find(|i| i.id == line.order_item_id) else {
                continue;
            };
            let qty = line.quantity.min(item.qty_to_refund());
            if qty == 0 {
                continue;
            }

            let effect = totals::refund_stock_effect(item, qty);
            let stock_delta = if memo.restock { effect.return_to_stock } else { 0 };
            if let Some(product_id) = item.product_id {
                if stock_delta != 0 || effect.release_reserved != 0 {
                    self.catalog_repo
                        .apply_stock_movement(&mut *conn, tenant_id, product_id, stock_delta, -effect.release_reserved)
                        .await?;
                }
            }

            item.qty_refunded += qty;
            self.order_repo.save_item_quantities(&mut *conn, item).await?;
        }

        self.transaction_repo
            .insert(
                &mut *conn,
                tenant_id,
                &NewTransaction {
                    order_id: order.id,
                    invoice_id: memo.invoice_id,
                    credit_memo_id: Some(memo.id),
                    kind: TransactionKind::Refund,
                    status: TransactionStatus::Success,
                    amount: memo.grand_total,
                    payment_method: order.payment_method,
                    gateway_reference: None,
                    notes: memo.reason.as_deref(),
                },
            )
            .await?;

        order.total_refunded += memo.grand_total;
        order.shipping_refunded += memo.shipping_refund;
        order.payment_status =
            totals::derive_payment_status(order.grand_total, order.total_paid, order.total_refunded, order.payment_status);
        order.status = status_after_refund(&order, &items);
        let order = self.order_repo.save_state(&mut *conn, &order).await?;

        let memo = self
            .credit_memo_repo
            .set_status(&mut *conn, tenant_id, memo.id, CreditMemoStatus::Refunded)
            .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            credit_memo_id = %memo.id,
            amount = %memo.grand_total,
            total_refunded = %order.total_refunded,
            order_status = %order.status,
            "refund issued"
        );

        Ok((order, memo))
    }

    async fn load_detail(&self, conn: &mut PgConnection, tenant_id: Uuid, memo_id: Uuid) -> Result<CreditMemoDetail, AppError> {
        let memo = self
            .credit_memo_repo
            .find(&mut *conn, tenant_id, memo_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Credit memo".into()))?;
        let order = self
            .order_repo
            .find(&mut *conn, tenant_id, memo.order_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Order".into()))?;
        let items = self.credit_memo_repo.list_items(&mut *conn, tenant_id, memo.id).await?;

        Ok(CreditMemoDetail {
            header: memo,
            order_number: order.order_number,
            items,
        })
    }

    async fn lock_with_order(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        memo_id: Uuid,
    ) -> Result<(Order, CreditMemo), AppError> {
        let not_found = || AppError::ResourceNotFound("Credit memo".into());

        let order_id = self
            .credit_memo_repo
            .find(&mut *conn, tenant_id, memo_id)
            .await?
            .ok_or_else(not_found)?
            .order_id;
        let order = lock_order(&self.order_repo, &mut *conn, tenant_id, order_id).await?;
        let memo = self
            .credit_memo_repo
            .find(&mut *conn, tenant_id, memo_id)
            .await?
            .ok_or_else(not_found)?;
        Ok((order, memo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    use crate::models::sales::{PaymentMethod, PaymentStatus, ShippingMethod};

    fn item(quantity: i32, refunded: i32, cancelled: i32) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            order_id: Uuid::nil(),
            product_id: None,
            sku: "MUG-01".into(),
            name: "Mug".into(),
            price: Decimal::from(250),
            quantity,
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            row_total: Decimal::from(250 * quantity),
            qty_invoiced: quantity,
            qty_shipped: 0,
            qty_refunded: refunded,
            qty_cancelled: cancelled,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn open_memos_reduce_what_is_refundable() {
        let line = item(5, 1, 0);
        let open = HashMap::from([(line.id, 3)]);
        assert_eq!(refundable_qty(&line, &open), 1);
        assert_eq!(refundable_qty(&line, &HashMap::new()), 4);
    }

    fn order(paid: i64, refunded: i64) -> Order {
        Order {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            order_number: "ORD-0000000002".into(),
            customer_id: None,
            customer_email: "meera@example.com".into(),
            status: OrderStatus::Processing,
            payment_status: PaymentStatus::Paid,
            payment_method: PaymentMethod::Card,
            shipping_method: ShippingMethod::FlatRate,
            currency: "INR".into(),
            subtotal: Decimal::from(500),
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            shipping_amount: Decimal::from(50),
            grand_total: Decimal::from(550),
            total_paid: Decimal::from(paid),
            total_refunded: Decimal::from(refunded),
            shipping_refunded: Decimal::ZERO,
            shipping_address: serde_json::Value::Null,
            billing_address: serde_json::Value::Null,
            notes: None,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn amounts(lines: i64, shipping: i64, fee: i64) -> MemoAmounts {
        MemoAmounts {
            lines: LineAmounts {
                subtotal: Decimal::from(lines),
                discount: Decimal::ZERO,
                tax: Decimal::ZERO,
                row_total: Decimal::from(lines),
            },
            shipping_refund: Decimal::from(shipping),
            adjustment_refund: Decimal::ZERO,
            adjustment_fee: Decimal::from(fee),
        }
    }

    fn open(grand_total: i64, shipping: i64) -> OpenMemoTotals {
        OpenMemoTotals { grand_total: Decimal::from(grand_total), shipping_refund: Decimal::from(shipping) }
    }

    #[rstest]
    // Paid in full, nothing refunded or pending.
    #[case(order(550, 0), open(0, 0), amounts(500, 50, 0), Ok(550))]
    // An open memo holds 300 of the 550 paid.
    #[case(order(550, 0), open(300, 0), amounts(250, 0, 0), Ok(250))]
    #[case(order(550, 0), open(300, 0), amounts(250, 10, 0), Err("REFUND_EXCEEDS_MAXIMUM"))]
    // Shipping already held by an open memo.
    #[case(order(550, 0), open(50, 50), amounts(0, 1, 0), Err("REFUND_EXCEEDS_MAXIMUM"))]
    // Earlier refunds count too.
    #[case(order(550, 500), open(0, 0), amounts(100, 0, 0), Err("REFUND_EXCEEDS_MAXIMUM"))]
    // Nothing captured yet.
    #[case(order(0, 0), open(0, 0), amounts(250, 0, 0), Err("REFUND_EXCEEDS_MAXIMUM"))]
    // The fee eats the whole refund.
    #[case(order(550, 0), open(0, 0), amounts(20, 0, 20), Err("NOTHING_TO_REFUND"))]
    fn memo_ceilings(
        #[case] order: Order,
        #[case] open: OpenMemoTotals,
        #[case] amounts: MemoAmounts,
        #[case] expected: Result<i64, &str>,
    ) {
        let result = memo_grand_total(&order, open, amounts).map_err(|e| e.code());
        assert_eq!(result, expected.map(Decimal::from));
    }

    fn shipped(mut line: OrderItem, shipped: i32) -> OrderItem {
        line.qty_shipped = shipped;
        line
    }

    #[test]
    fn refunding_the_last_unshipped_units_completes_shipping() {
        // Two of three shipped, the third just refunded.
        let order = order(550, 100);
        let items = [shipped(item(3, 1, 0), 2)];
        assert_eq!(status_after_refund(&order, &items), OrderStatus::Shipped);
    }

    #[rstest]
    // Units still waiting to ship.
    #[case(shipped(item(3, 0, 0), 2), OrderStatus::Processing)]
    // Nothing shipped at all: the order is not in transit.
    #[case(item(3, 3, 0), OrderStatus::Processing)]
    fn partial_refunds_keep_processing_orders(#[case] line: OrderItem, #[case] expected: OrderStatus) {
        assert_eq!(status_after_refund(&order(550, 100), &[line]), expected);
    }

    #[test]
    fn full_refunds_close_the_order() {
        assert_eq!(status_after_refund(&order(550, 550), &[item(3, 3, 0)]), OrderStatus::Refunded);
    }

    #[test]
    fn refundable_never_goes_negative() {
        let line = item(2, 1, 1);
        let open = HashMap::from([(line.id, 1)]);
        assert_eq!(refundable_qty(&line, &open), 0);
    }
}
