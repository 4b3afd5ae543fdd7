// src/db/shipment_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        fulfillment::{Shipment, ShipmentItem},
        sales::{OrderItem, ShipmentStatus},
    },
};

const SHIPMENT_COLUMNS: &str = "id, tenant_id, order_id, shipment_number, status, carrier, tracking_number, \
     total_qty, notes, shipped_at, delivered_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, tenant_id, shipment_id, order_item_id, sku, name, quantity";

#[derive(Clone, Default)]
pub struct ShipmentRepository;

impl ShipmentRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        shipment_number: &str,
        carrier: Option<&str>,
        tracking_number: Option<&str>,
        total_qty: i32,
        notes: Option<&str>,
    ) -> Result<Shipment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO shipments (
                tenant_id, order_id, shipment_number, carrier, tracking_number, total_qty, notes, shipped_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING {SHIPMENT_COLUMNS}
            "#
        );
        let shipment = sqlx::query_as::<_, Shipment>(&sql)
            .bind(tenant_id)
            .bind(order_id)
            .bind(shipment_number)
            .bind(carrier)
            .bind(tracking_number)
            .bind(total_qty)
            .bind(notes)
            .fetch_one(executor)
            .await?;
        Ok(shipment)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        shipment: &Shipment,
        item: &OrderItem,
        quantity: i32,
    ) -> Result<ShipmentItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO shipment_items (tenant_id, shipment_id, order_item_id, sku, name, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ITEM_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, ShipmentItem>(&sql)
            .bind(shipment.tenant_id)
            .bind(shipment.id)
            .bind(item.id)
            .bind(&item.sku)
            .bind(&item.name)
            .bind(quantity)
            .fetch_one(executor)
            .await?;
        Ok(created)
    }

    pub async fn find<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Shipment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE tenant_id = $1 AND id = $2");
        let shipment = sqlx::query_as::<_, Shipment>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(shipment)
    }

    pub async fn list_for_order<'e, E>(&self, executor: E, tenant_id: Uuid, order_id: Uuid) -> Result<Vec<Shipment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE tenant_id = $1 AND order_id = $2 ORDER BY created_at, id"
        );
        let shipments = sqlx::query_as::<_, Shipment>(&sql)
            .bind(tenant_id)
            .bind(order_id)
            .fetch_all(executor)
            .await?;
        Ok(shipments)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        status: Option<ShipmentStatus>,
        order_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Shipment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {SHIPMENT_COLUMNS} FROM shipments
            WHERE tenant_id = $1
              AND ($2::shipment_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR order_id = $3)
            ORDER BY created_at DESC, id
            LIMIT $4 OFFSET $5
            "#
        );
        let shipments = sqlx::query_as::<_, Shipment>(&sql)
            .bind(tenant_id)
            .bind(status)
            .bind(order_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await?;
        Ok(shipments)
    }

    pub async fn count<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        status: Option<ShipmentStatus>,
        order_id: Option<Uuid>,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM shipments
            WHERE tenant_id = $1
              AND ($2::shipment_status IS NULL OR status = $2)
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

    pub async fn list_items<'e, E>(&self, executor: E, tenant_id: Uuid, shipment_id: Uuid) -> Result<Vec<ShipmentItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM shipment_items WHERE tenant_id = $1 AND shipment_id = $2 ORDER BY sku, id"
        );
        let items = sqlx::query_as::<_, ShipmentItem>(&sql)
            .bind(tenant_id)
            .bind(shipment_id)
            .fetch_all(executor)
            .await?;
        Ok(items)
    }

    pub async fn update_tracking<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        carrier: Option<&str>,
        tracking_number: &str,
    ) -> Result<Shipment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE shipments SET
                carrier = COALESCE($3, carrier),
                tracking_number = $4,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {SHIPMENT_COLUMNS}
            "#
        );
        let shipment = sqlx::query_as::<_, Shipment>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(carrier)
            .bind(tracking_number)
            .fetch_one(executor)
            .await?;
        Ok(shipment)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        status: ShipmentStatus,
    ) -> Result<Shipment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE shipments SET
                status = $3,
                delivered_at = CASE WHEN $3 = 'delivered'::shipment_status THEN NOW() ELSE delivered_at END,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {SHIPMENT_COLUMNS}
            "#
        );
        let shipment = sqlx::query_as::<_, Shipment>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(status)
            .fetch_one(executor)
            .await?;
        Ok(shipment)
    }

    /// Whether some non-cancelled shipment of the order is still on its way.
    pub async fn has_undelivered<'e, E>(&self, executor: E, tenant_id: Uuid, order_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM shipments
                WHERE tenant_id = $1 AND order_id = $2 AND status = 'shipped'
            )
            "#,
        )
        .bind(tenant_id)
        .bind(order_id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }
}
