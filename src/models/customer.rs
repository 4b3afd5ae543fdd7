// src/models/customer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Tenant-scoped profile of a user account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    #[serde(flatten)]
    pub customer: Customer,
    pub email: String,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inline address. Also the shape of the JSON snapshot stored on orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[validate(length(min = 1, max = 150, message = "validation.required"))]
    #[schema(example = "Asha Rao")]
    pub name: String,
    #[validate(length(min = 1, max = 255, message = "validation.required"))]
    #[schema(example = "12 MG Road")]
    pub line1: String,
    #[validate(length(max = 255, message = "validation.length"))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100, message = "validation.required"))]
    #[schema(example = "Bengaluru")]
    pub city: String,
    #[validate(length(max = 100, message = "validation.length"))]
    #[schema(example = "KA")]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20, message = "validation.required"))]
    #[schema(example = "560001")]
    pub postal_code: String,
    #[validate(length(min = 2, max = 2, message = "validation.length"))]
    #[schema(example = "IN")]
    pub country: String,
    #[validate(length(max = 30, message = "validation.length"))]
    pub phone: Option<String>,
}

impl From<&Address> for AddressInput {
    fn from(a: &Address) -> Self {
        Self {
            name: a.name.clone(),
            line1: a.line1.clone(),
            line2: a.line2.clone(),
            city: a.city.clone(),
            state: a.state.clone(),
            postal_code: a.postal_code.clone(),
            country: a.country.clone(),
            phone: a.phone.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveAddressPayload {
    #[serde(flatten)]
    #[validate(nested)]
    pub address: AddressInput,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePayload {
    #[validate(length(max = 100, message = "validation.length"))]
    pub first_name: Option<String>,
    #[validate(length(max = 100, message = "validation.length"))]
    pub last_name: Option<String>,
    #[validate(length(max = 30, message = "validation.length"))]
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_requires_core_fields() {
        let address = AddressInput {
            name: "Asha Rao".into(),
            line1: "".into(),
            line2: None,
            city: "Bengaluru".into(),
            state: None,
            postal_code: "560001".into(),
            country: "IND".into(),
            phone: None,
        };
        let errors = address.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("line1"));
        assert!(fields.contains_key("country"));
        assert!(!fields.contains_key("city"));
    }

    #[test]
    fn saved_address_payload_is_flat() {
        let payload: SaveAddressPayload = serde_json::from_value(serde_json::json!({
            "name": "Home", "line1": "1 Main St", "city": "Pune",
            "postalCode": "411001", "country": "IN", "isDefault": true
        }))
        .unwrap();
        assert!(payload.is_default);
        assert_eq!(payload.address.city, "Pune");
        assert!(payload.validate().is_ok());
    }
}
