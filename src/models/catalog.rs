// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::common::{
    response::PageParams,
    validation::{non_zero, not_negative},
};
use crate::models::sales::labelled_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "product_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Draft,
    Archived,
}

labelled_enum!(ProductStatus {
    Active => "active",
    Draft => "draft",
    Archived => "archived",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub parent_id: Option<Uuid>,
    #[schema(example = "T-Shirts")]
    pub name: String,
    #[schema(example = "t-shirts")]
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub category_id: Option<Uuid>,
    #[schema(example = "TSHIRT-BLK-M")]
    pub sku: String,
    #[schema(example = "Black T-Shirt (M)")]
    pub name: String,
    #[schema(example = "black-t-shirt-m")]
    pub slug: String,
    pub description: Option<String>,
    #[schema(example = 999.0)]
    pub price: Decimal,
    pub stock_quantity: i32,
    pub reserved_quantity: i32,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn available(&self) -> i32 {
        (self.stock_quantity - self.reserved_quantity).max(0)
    }

    pub fn is_sellable(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    pub category_id: Option<Uuid>,
    /// Matches name or SKU.
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductListQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams { page: self.page, per_page: self.per_page }
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryPayload {
    pub parent_id: Option<Uuid>,
    #[validate(length(min = 1, max = 150, message = "validation.required"))]
    pub name: String,
    /// Derived from the name when omitted.
    #[validate(length(min = 1, max = 150, message = "validation.length"))]
    pub slug: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPayload {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64, message = "validation.required"))]
    pub sku: String,
    #[validate(length(min = 1, max = 255, message = "validation.required"))]
    pub name: String,
    #[validate(length(min = 1, max = 255, message = "validation.length"))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(custom(function = "not_negative"))]
    pub price: Decimal,
    #[validate(range(min = 0, message = "validation.not_negative"))]
    #[serde(default)]
    pub stock_quantity: i32,
    pub status: Option<ProductStatus>,
}

// Absent fields are left untouched.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductPayload {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "validation.required"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom(function = "not_negative"))]
    pub price: Option<Decimal>,
    pub status: Option<ProductStatus>,
}

// validator 0.20 hands `Copy` fields to custom validators by value.
fn non_zero_by_value(value: i32) -> Result<(), validator::ValidationError> {
    non_zero(&value)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockPayload {
    /// Signed change to the physical stock.
    #[validate(
        range(min = -1_000_000, max = 1_000_000, message = "validation.range"),
        custom(function = "non_zero_by_value")
    )]
    #[schema(example = -3)]
    pub delta: i32,
    #[validate(length(max = 255, message = "validation.length"))]
    pub reason: Option<String>,
}

/// Lower-case, dash separated slug.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_dash = true;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Black T-Shirt (M)", "black-t-shirt-m")]
    #[case("  Summer   Sale!! ", "summer-sale")]
    #[case("Café", "caf")]
    fn slugs(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slugify(input), expected);
    }

    #[rstest]
    #[case(-3, true)]
    #[case(0, false)]
    #[case(i32::MAX, false)]
    #[case(-1_000_001, false)]
    fn stock_deltas_are_bounded(#[case] delta: i32, #[case] valid: bool) {
        let payload = AdjustStockPayload { delta, reason: None };
        assert_eq!(payload.validate().is_ok(), valid);
    }

    #[test]
    fn availability_never_negative() {
        let product = Product {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            category_id: None,
            sku: "A".into(),
            name: "A".into(),
            slug: "a".into(),
            description: None,
            price: Decimal::ONE,
            stock_quantity: 2,
            reserved_quantity: 5,
            status: ProductStatus::Draft,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(product.available(), 0);
        assert!(!product.is_sellable());
    }
}
