// src/models/billing.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::common::{
    response::PageParams,
    validation::{not_negative, positive},
};
use crate::models::sales::{labelled_enum, CreditMemoStatus, InvoiceStatus, PaymentMethod};

// ---
// Shared payload piece: "N units of this order line"
// ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemQuantity {
    pub order_item_id: Uuid,
    #[validate(range(min = 1, max = 100_000, message = "validation.range"))]
    #[schema(example = 1)]
    pub quantity: i32,
}

// ---
// Invoices
// ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    #[schema(example = "INV-1C9E04A7D2")]
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub grand_total: Decimal,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub order_item_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub row_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub header: Invoice,
    pub order_number: String,
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoicePayload {
    /// Omit to invoice everything still invoiceable.
    #[validate(nested)]
    pub items: Option<Vec<ItemQuantity>>,
    #[validate(length(max = 1000, message = "validation.length"))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkInvoicePaidPayload {
    #[validate(length(max = 255, message = "validation.length"))]
    #[schema(example = "pay_NB12ZX9")]
    pub gateway_reference: Option<String>,
}

// ---
// Credit memos
// ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditMemo {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    pub invoice_id: Option<Uuid>,
    #[schema(example = "CM-5D20B8F1AE")]
    pub credit_memo_number: String,
    pub status: CreditMemoStatus,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub shipping_refund: Decimal,
    pub adjustment_refund: Decimal,
    pub adjustment_fee: Decimal,
    pub grand_total: Decimal,
    pub restock: bool,
    pub reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditMemoItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub credit_memo_id: Uuid,
    pub order_item_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub row_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditMemoDetail {
    #[serde(flatten)]
    pub header: CreditMemo,
    pub order_number: String,
    pub items: Vec<CreditMemoItem>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCreditMemoPayload {
    pub invoice_id: Option<Uuid>,
    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<ItemQuantity>,
    #[validate(custom(function = "not_negative"))]
    #[schema(example = 0.0)]
    pub shipping_refund: Option<Decimal>,
    #[validate(custom(function = "not_negative"))]
    pub adjustment_refund: Option<Decimal>,
    #[validate(custom(function = "not_negative"))]
    pub adjustment_fee: Option<Decimal>,
    /// Put returned (already shipped) units back in stock.
    #[serde(default)]
    pub restock: bool,
    /// Refund immediately (default) or leave the memo open.
    pub refund_now: Option<bool>,
    #[validate(length(max = 1000, message = "validation.length"))]
    pub reason: Option<String>,
}

/// A line of the refund form.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundableItem {
    pub order_item_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub qty_refunded: i32,
    pub qty_in_open_memos: i32,
    pub qty_refundable: i32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundPreview {
    pub order_id: Uuid,
    pub items: Vec<RefundableItem>,
    pub shipping_refundable: Decimal,
    pub max_refundable: Decimal,
}

// ---
// Transactions
// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "transaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Authorization,
    Capture,
    Refund,
    Void,
}

labelled_enum!(TransactionKind {
    Authorization => "authorization",
    Capture => "capture",
    Refund => "refund",
    Void => "void",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

labelled_enum!(TransactionStatus {
    Pending => "pending",
    Success => "success",
    Failed => "failed",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub credit_memo_id: Option<Uuid>,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub gateway_reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentPayload {
    #[validate(custom(function = "positive"))]
    #[schema(example = 2406.64)]
    pub amount: Decimal,
    /// Defaults to the order's payment method.
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(max = 255, message = "validation.length"))]
    pub gateway_reference: Option<String>,
    #[validate(length(max = 1000, message = "validation.length"))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailedPaymentPayload {
    #[validate(length(max = 255, message = "validation.length"))]
    pub gateway_reference: Option<String>,
    #[validate(length(max = 1000, message = "validation.length"))]
    pub notes: Option<String>,
}

// ---
// Grid filters
// ---

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InvoiceListQuery {
    pub status: Option<InvoiceStatus>,
    pub order_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CreditMemoListQuery {
    pub status: Option<CreditMemoStatus>,
    pub order_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TransactionListQuery {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub order_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl InvoiceListQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams { page: self.page, per_page: self.per_page }
    }
}

impl CreditMemoListQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams { page: self.page, per_page: self.per_page }
    }
}

impl TransactionListQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams { page: self.page, per_page: self.per_page }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn credit_memo_payload_rejects_negative_amounts() {
        let payload: CreateCreditMemoPayload = serde_json::from_value(serde_json::json!({
            "items": [{ "orderItemId": Uuid::nil(), "quantity": 1 }],
            "adjustmentFee": -5
        }))
        .unwrap();
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("adjustment_fee"));
        assert!(!payload.restock);
        assert_eq!(payload.refund_now, None);
    }

    #[test]
    fn zero_quantity_lines_are_invalid() {
        let payload: CreateInvoicePayload = serde_json::from_value(serde_json::json!({
            "items": [{ "orderItemId": Uuid::nil(), "quantity": 0 }]
        }))
        .unwrap();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn payment_amount_must_be_positive() {
        let payload: RecordPaymentPayload =
            serde_json::from_value(serde_json::json!({ "amount": 0 })).unwrap();
        assert!(payload.validate().is_err());
    }
}
