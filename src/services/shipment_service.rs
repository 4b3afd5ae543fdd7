// src/services/shipment_service.rs

use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::{error::AppError, numbering::document_number, response::Paginated},
    db::{CatalogRepository, OrderRepository, ShipmentRepository},
    models::{
        fulfillment::{CreateShipmentPayload, Shipment, ShipmentDetail, ShipmentListQuery},
        sales::{Order, OrderItem, OrderStatus, ShipmentStatus},
    },
    services::{order_service::lock_order, totals},
};

/// `Shipped` once every open unit has left the warehouse.
pub fn status_after_shipment(items: &[OrderItem]) -> OrderStatus {
    if items.iter().all(|i| i.qty_to_ship() == 0) {
        OrderStatus::Shipped
    } else {
        OrderStatus::Processing
    }
}

/// Units a cancelled shipment line puts back on the shelf, reserved for the order again.
///
/// Refunds consume unshipped units first, so shipped + refunded + cancelled above the
/// ordered quantity means a shipped unit was refunded and the shipment cannot be undone.
pub fn shipment_reversal(item: &OrderItem, line_qty: i32) -> Result<i32, AppError> {
    if item.qty_shipped + item.qty_refunded + item.qty_cancelled > item.quantity {
        return Err(AppError::ShipmentRefunded(item.sku.clone()));
    }
    Ok(line_qty.min(item.qty_shipped).max(0))
}

#[derive(Clone)]
pub struct ShipmentService {
    shipment_repo: ShipmentRepository,
    order_repo: OrderRepository,
    catalog_repo: CatalogRepository,
}

impl ShipmentService {
    pub fn new(shipment_repo: ShipmentRepository, order_repo: OrderRepository, catalog_repo: CatalogRepository) -> Self {
        Self { shipment_repo, order_repo, catalog_repo }
    }

    pub async fn create_shipment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        payload: &CreateShipmentPayload,
    ) -> Result<ShipmentDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let mut order = lock_order(&self.order_repo, &mut *tx, tenant_id, order_id).await?;
        if !order.status.accepts_shipments() {
            return Err(AppError::OrderStateConflict(order.status));
        }

        let mut items = self.order_repo.list_items(&mut *tx, tenant_id, order.id).await?;
        let selection: Vec<(Uuid, i32)> =
            totals::select_quantities(&items, payload.items.as_deref(), |i| i.qty_to_ship())?
                .into_iter()
                .map(|(item, qty)| (item.id, qty))
                .collect();
        if selection.is_empty() {
            return Err(AppError::NothingToShip);
        }

        let mut product_ids: Vec<Uuid> = items
            .iter()
            .filter(|i| selection.iter().any(|(id, _)| *id == i.id))
            .filter_map(|i| i.product_id)
            .collect();
        product_ids.sort();
        product_ids.dedup();
        self.catalog_repo.lock_products(&mut *tx, tenant_id, &product_ids).await?;

        let total_qty: i32 = selection.iter().map(|(_, qty)| qty).sum();
        let number = document_number("SHP");
        let shipment = self
            .shipment_repo
            .insert(
                &mut *tx,
                tenant_id,
                order.id,
                &number,
                payload.carrier.as_deref(),
                payload.tracking_number.as_deref(),
                total_qty,
                payload.notes.as_deref(),
            )
            .await?;

        let mut shipment_items = Vec::with_capacity(selection.len());
        for (item_id, qty) in &selection {
            let Some(item) = items.iter_mut().find(|i| i.id == *item_id) else {
                continue;
            };
            shipment_items.push(self.shipment_repo.insert_item(&mut *tx, &shipment, item, *qty).await?);

            // Reserved units leave the shelf.
            if let Some(product_id) = item.product_id {
                self.catalog_repo
                    .apply_stock_movement(&mut *tx, tenant_id, product_id, -qty, -qty)
                    .await?;
            }
            item.qty_shipped += qty;
            self.order_repo.save_item_quantities(&mut *tx, item).await?;
        }

        order.status = status_after_shipment(&items);
        let order = self.order_repo.save_state(&mut *tx, &order).await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            shipment_id = %shipment.id,
            total_qty,
            order_status = %order.status,
            "shipment created"
        );

        Ok(ShipmentDetail {
            header: shipment,
            order_number: order.order_number,
            items: shipment_items,
        })
    }

    pub async fn update_tracking<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        shipment_id: Uuid,
        carrier: Option<&str>,
        tracking_number: &str,
    ) -> Result<ShipmentDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let (order, shipment) = self.lock_with_order(&mut *tx, tenant_id, shipment_id).await?;
        if shipment.status == ShipmentStatus::Cancelled {
            return Err(AppError::ShipmentNotModifiable(shipment.status));
        }

        let shipment = self
            .shipment_repo
            .update_tracking(&mut *tx, tenant_id, shipment.id, carrier, tracking_number)
            .await?;
        let items = self.shipment_repo.list_items(&mut *tx, tenant_id, shipment.id).await?;
        tx.commit().await?;

        Ok(ShipmentDetail {
            header: shipment,
            order_number: order.order_number,
            items,
        })
    }

    /// The order becomes delivered when it is fully shipped and nothing is still on its way.
    pub async fn mark_delivered<'e, E>(&self, executor: E, tenant_id: Uuid, shipment_id: Uuid) -> Result<ShipmentDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let (mut order, shipment) = self.lock_with_order(&mut *tx, tenant_id, shipment_id).await?;
        if shipment.status != ShipmentStatus::Shipped {
            return Err(AppError::ShipmentNotModifiable(shipment.status));
        }

        let shipment = self
            .shipment_repo
            .set_status(&mut *tx, tenant_id, shipment.id, ShipmentStatus::Delivered)
            .await?;

        if order.status == OrderStatus::Shipped {
            let items = self.order_repo.list_items(&mut *tx, tenant_id, order.id).await?;
            let fully_shipped = items.iter().all(|i| i.qty_to_ship() == 0);
            if fully_shipped && !self.shipment_repo.has_undelivered(&mut *tx, tenant_id, order.id).await? {
                order.status = OrderStatus::Delivered;
                order = self.order_repo.save_state(&mut *tx, &order).await?;
            }
        }

        let items = self.shipment_repo.list_items(&mut *tx, tenant_id, shipment.id).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            shipment_id = %shipment.id,
            order_status = %order.status,
            "shipment delivered"
        );

        Ok(ShipmentDetail {
            header: shipment,
            order_number: order.order_number,
            items,
        })
    }

    /// Puts the units back on the shelf, reserved for the order again.
    pub async fn cancel_shipment<'e, E>(&self, executor: E, tenant_id: Uuid, shipment_id: Uuid) -> Result<ShipmentDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let (mut order, shipment) = self.lock_with_order(&mut *tx, tenant_id, shipment_id).await?;
        if shipment.status != ShipmentStatus::Shipped {
            return Err(AppError::ShipmentNotModifiable(shipment.status));
        }
        if order.status.is_closed() {
            return Err(AppError::OrderStateConflict(order.status));
        }

        let lines = self.shipment_repo.list_items(&mut *tx, tenant_id, shipment.id).await?;
        let mut items = self.order_repo.list_items(&mut *tx, tenant_id, order.id).await?;

        let mut product_ids: Vec<Uuid> = items
            .iter()
            .filter(|i| lines.iter().any(|l| l.order_item_id == i.id))
            .filter_map(|i| i.product_id)
            .collect();
        product_ids.sort();
        product_ids.dedup();
        self.catalog_repo.lock_products(&mut *tx, tenant_id, &product_ids).await?;

        let mut reversals = Vec::with_capacity(lines.len());
        for line in &lines {
            if let Some(item) = items.iter().find(|i| i.id == line.order_item_id) {
                reversals.push((item.id, shipment_reversal(item, line.quantity)?));
            }
        }

        for (item_id, qty) in reversals {
            let Some(item) = items.iter_mut().find(|i| i.id == item_id) else {
                continue;
            };
            if let Some(product_id) = item.product_id {
                self.catalog_repo
                    .apply_stock_movement(&mut *tx, tenant_id, product_id, qty, qty)
                    .await?;
            }
            item.qty_shipped -= qty;
            self.order_repo.save_item_quantities(&mut *tx, item).await?;
        }

        let shipment = self
            .shipment_repo
            .set_status(&mut *tx, tenant_id, shipment.id, ShipmentStatus::Cancelled)
            .await?;

        if order.status == OrderStatus::Shipped {
            order.status = OrderStatus::Processing;
            order = self.order_repo.save_state(&mut *tx, &order).await?;
        }

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant_id, order_id = %order.id, shipment_id = %shipment.id, "shipment cancelled");

        Ok(ShipmentDetail {
            header: shipment,
            order_number: order.order_number,
            items: lines,
        })
    }

    pub async fn list_shipments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        query: &ShipmentListQuery,
    ) -> Result<Paginated<Shipment>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let params = query.page_params();
        let total = self.shipment_repo.count(&mut *conn, tenant_id, query.status, query.order_id).await?;
        let shipments = self
            .shipment_repo
            .list(&mut *conn, tenant_id, query.status, query.order_id, params.limit(), params.offset())
            .await?;
        Ok(Paginated::new(shipments, total, &params))
    }

    pub async fn get_shipment<'e, E>(&self, executor: E, tenant_id: Uuid, shipment_id: Uuid) -> Result<ShipmentDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let shipment = self
            .shipment_repo
            .find(&mut *conn, tenant_id, shipment_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Shipment".into()))?;
        let order = self
            .order_repo
            .find(&mut *conn, tenant_id, shipment.order_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Order".into()))?;
        let items = self.shipment_repo.list_items(&mut *conn, tenant_id, shipment.id).await?;

        Ok(ShipmentDetail {
            header: shipment,
            order_number: order.order_number,
            items,
        })
    }

    async fn lock_with_order(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        shipment_id: Uuid,
    ) -> Result<(Order, Shipment), AppError> {
        let not_found = || AppError::ResourceNotFound("Shipment".into());

        let order_id = self
            .shipment_repo
            .find(&mut *conn, tenant_id, shipment_id)
            .await?
            .ok_or_else(not_found)?
            .order_id;
        let order = lock_order(&self.order_repo, &mut *conn, tenant_id, order_id).await?;
        let shipment = self
            .shipment_repo
            .find(&mut *conn, tenant_id, shipment_id)
            .await?
            .ok_or_else(not_found)?;
        Ok((order, shipment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn item(quantity: i32, shipped: i32, refunded: i32) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            order_id: Uuid::nil(),
            product_id: None,
            sku: "SKU".into(),
            name: "Thing".into(),
            price: Decimal::from(10),
            quantity,
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            row_total: Decimal::from(10 * quantity),
            qty_invoiced: 0,
            qty_shipped: shipped,
            qty_refunded: refunded,
            qty_cancelled: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn partial_shipments_keep_the_order_processing() {
        assert_eq!(status_after_shipment(&[item(2, 2, 0), item(3, 1, 0)]), OrderStatus::Processing);
    }

    #[test]
    fn refunded_units_do_not_hold_the_order_back() {
        // One unit refunded before shipping, the other two shipped.
        assert_eq!(status_after_shipment(&[item(3, 2, 1)]), OrderStatus::Shipped);
    }

    #[rstest]
    // Nothing refunded: every shipped unit goes back.
    #[case(item(2, 2, 0), 2, Some(2))]
    // The refund took the unshipped unit, the shipped ones are untouched.
    #[case(item(3, 2, 1), 2, Some(2))]
    // Line of an earlier shipment already partly reversed.
    #[case(item(4, 1, 0), 2, Some(1))]
    // One of two shipped units refunded (and possibly restocked).
    #[case(item(2, 2, 1), 2, None)]
    #[case(item(3, 3, 3), 3, None)]
    fn cancelled_shipments_never_return_refunded_units(
        #[case] it: OrderItem,
        #[case] line_qty: i32,
        #[case] expected: Option<i32>,
    ) {
        match (shipment_reversal(&it, line_qty), expected) {
            (Ok(qty), Some(want)) => assert_eq!(qty, want),
            (Err(AppError::ShipmentRefunded(sku)), None) => assert_eq!(sku, "SKU"),
            (other, _) => panic!("unexpected {other:?} for {expected:?}"),
        }
    }

    #[test]
    fn reversal_keeps_the_reservation_equal_to_open_units() {
        // Ship 2 of 3 after one unshipped unit was refunded, then cancel the shipment.
        let mut it = item(3, 2, 1);
        let back = shipment_reversal(&it, 2).unwrap();
        it.qty_shipped -= back;
        assert_eq!(it.qty_to_ship(), back);
    }
}
