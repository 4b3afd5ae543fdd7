// src/models/settings.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::validation::not_negative;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantSettings {
    #[schema(ignore)]
    pub tenant_id: Uuid,

    #[schema(example = "Cartxis Retail Pvt Ltd")]
    pub company_name: Option<String>,

    #[schema(example = "29ABCDE1234F1Z5")]
    pub tax_id: Option<String>,

    #[schema(example = "12 MG Road, Bengaluru 560001")]
    pub address: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,

    #[schema(example = "INR")]
    pub currency: String,

    /// Percentage applied to the discounted line subtotal.
    #[schema(example = 18.0)]
    pub tax_rate: Decimal,

    #[schema(example = 49.0)]
    pub flat_shipping_rate: Decimal,

    /// Subtotal from which shipping is free. `None` disables free shipping.
    #[schema(example = 1500.0)]
    pub free_shipping_threshold: Option<Decimal>,

    #[schema(example = "cartxis@okaxis")]
    pub upi_id: Option<String>,

    pub updated_at: Option<DateTime<Utc>>,
}

impl TenantSettings {
    /// Settings of a store that never saved any.
    pub fn defaults(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            company_name: None,
            tax_id: None,
            address: None,
            email: None,
            phone: None,
            currency: "INR".to_string(),
            tax_rate: Decimal::ZERO,
            flat_shipping_rate: Decimal::ZERO,
            free_shipping_threshold: None,
            upi_id: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[validate(length(max = 150, message = "validation.length"))]
    pub company_name: Option<String>,
    #[validate(length(max = 50, message = "validation.length"))]
    pub tax_id: Option<String>,
    pub address: Option<String>,
    #[validate(email(message = "validation.email"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 3, max = 3, message = "validation.length"))]
    pub currency: String,
    #[validate(custom(function = "not_negative"))]
    pub tax_rate: Decimal,
    #[validate(custom(function = "not_negative"))]
    pub flat_shipping_rate: Decimal,
    #[validate(custom(function = "not_negative"))]
    pub free_shipping_threshold: Option<Decimal>,
    pub upi_id: Option<String>,
}
