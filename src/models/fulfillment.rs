// src/models/fulfillment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::common::response::PageParams;
use crate::models::{billing::ItemQuantity, sales::ShipmentStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    #[schema(example = "SHP-92B1F0C3DE")]
    pub shipment_number: String,
    pub status: ShipmentStatus,
    #[schema(example = "Delhivery")]
    pub carrier: Option<String>,
    #[schema(example = "DL1234567890IN")]
    pub tracking_number: Option<String>,
    pub total_qty: i32,
    pub notes: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub shipment_id: Uuid,
    pub order_item_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentDetail {
    #[serde(flatten)]
    pub header: Shipment,
    pub order_number: String,
    pub items: Vec<ShipmentItem>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShipmentPayload {
    /// Omit to ship everything still shippable.
    #[validate(nested)]
    pub items: Option<Vec<ItemQuantity>>,
    #[validate(length(max = 100, message = "validation.length"))]
    pub carrier: Option<String>,
    #[validate(length(max = 100, message = "validation.length"))]
    pub tracking_number: Option<String>,
    #[validate(length(max = 1000, message = "validation.length"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrackingPayload {
    #[validate(length(max = 100, message = "validation.length"))]
    pub carrier: Option<String>,
    #[validate(length(min = 1, max = 100, message = "validation.length"))]
    pub tracking_number: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ShipmentListQuery {
    pub status: Option<ShipmentStatus>,
    pub order_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ShipmentListQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams { page: self.page, per_page: self.per_page }
    }
}
