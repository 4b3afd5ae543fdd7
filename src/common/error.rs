// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

use crate::{
    common::i18n::I18nStore,
    middleware::i18n::Locale,
    models::sales::{CreditMemoStatus, InvoiceStatus, OrderStatus, ShipmentStatus},
};

// Domain error. Every variant has a stable `code` the clients can switch on.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail already exists")]
    EmailAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Missing permission {0}")]
    PermissionDenied(String),

    #[error("Not a member of this store")]
    NotATenantMember,

    #[error("{0} not found")]
    ResourceNotFound(String),

    #[error("Duplicate value: {0}")]
    UniqueConstraintViolation(String),

    #[error("Insufficient stock for {sku}: {available} available")]
    InsufficientStock { sku: String, available: i32 },

    #[error("Product {0} is not available for sale")]
    ProductUnavailable(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Shipping method {0} is not available for this cart")]
    ShippingMethodUnavailable(String),

    #[error("Invalid order status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order cannot be cancelled: {0}")]
    OrderNotCancellable(String),

    #[error("Operation not allowed while the order is {0}")]
    OrderStateConflict(OrderStatus),

    #[error("Nothing left to invoice")]
    NothingToInvoice,

    #[error("Nothing left to ship")]
    NothingToShip,

    #[error("Nothing to refund")]
    NothingToRefund,

    #[error("Quantity {requested} for {item} exceeds the {available} available")]
    QuantityExceeded { item: String, requested: i32, available: i32 },

    #[error("A paid invoice cannot be cancelled")]
    InvoiceAlreadyPaid,

    #[error("Invoice is {0}")]
    InvoiceNotPending(InvoiceStatus),

    #[error("Shipment is {0}")]
    ShipmentNotModifiable(ShipmentStatus),

    #[error("Shipped units of {0} were already refunded")]
    ShipmentRefunded(String),

    #[error("Credit memo is {0}")]
    CreditMemoNotOpen(CreditMemoStatus),

    #[error("Refund of {requested} exceeds the maximum refundable {max}")]
    RefundExceedsMaximum { requested: Decimal, max: Decimal },

    #[error("Payment of {requested} exceeds the outstanding {outstanding}")]
    PaymentExceedsOutstanding { requested: Decimal, outstanding: Decimal },

    #[error("Stock cannot drop below the reserved quantity ({reserved})")]
    StockBelowReserved { reserved: i32 },

    #[error("Font not found: {0}")]
    FontNotFound(String),

    #[error("Document rendering failed: {0}")]
    DocumentError(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Bcrypt error: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::NotATenantMember => "NOT_A_TENANT_MEMBER",
            AppError::ResourceNotFound(_) => "RESOURCE_NOT_FOUND",
            AppError::UniqueConstraintViolation(_) => "DUPLICATE_VALUE",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::ProductUnavailable(_) => "PRODUCT_UNAVAILABLE",
            AppError::EmptyCart => "EMPTY_CART",
            AppError::ShippingMethodUnavailable(_) => "SHIPPING_METHOD_UNAVAILABLE",
            AppError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            AppError::OrderNotCancellable(_) => "ORDER_NOT_CANCELLABLE",
            AppError::OrderStateConflict(_) => "ORDER_STATE_CONFLICT",
            AppError::NothingToInvoice => "NOTHING_TO_INVOICE",
            AppError::NothingToShip => "NOTHING_TO_SHIP",
            AppError::NothingToRefund => "NOTHING_TO_REFUND",
            AppError::QuantityExceeded { .. } => "QUANTITY_EXCEEDED",
            AppError::InvoiceAlreadyPaid => "INVOICE_ALREADY_PAID",
            AppError::InvoiceNotPending(_) => "INVOICE_NOT_PENDING",
            AppError::ShipmentNotModifiable(_) => "SHIPMENT_NOT_MODIFIABLE",
            AppError::ShipmentRefunded(_) => "SHIPMENT_REFUNDED",
            AppError::CreditMemoNotOpen(_) => "CREDIT_MEMO_NOT_OPEN",
            AppError::RefundExceedsMaximum { .. } => "REFUND_EXCEEDS_MAXIMUM",
            AppError::PaymentExceedsOutstanding { .. } => "PAYMENT_EXCEEDS_OUTSTANDING",
            AppError::StockBelowReserved { .. } => "STOCK_BELOW_RESERVED",
            AppError::FontNotFound(_)
            | AppError::DocumentError(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) | AppError::NotATenantMember => StatusCode::FORBIDDEN,
            AppError::UserNotFound | AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::EmailAlreadyExists | AppError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
            AppError::InsufficientStock { .. }
            | AppError::ProductUnavailable(_)
            | AppError::EmptyCart
            | AppError::ShippingMethodUnavailable(_)
            | AppError::QuantityExceeded { .. }
            | AppError::RefundExceedsMaximum { .. }
            | AppError::PaymentExceedsOutstanding { .. }
            | AppError::StockBelowReserved { .. }
            | AppError::NothingToInvoice
            | AppError::NothingToShip
            | AppError::NothingToRefund => StatusCode::BAD_REQUEST,
            AppError::InvalidStatusTransition { .. }
            | AppError::OrderNotCancellable(_)
            | AppError::OrderStateConflict(_)
            | AppError::InvoiceAlreadyPaid
            | AppError::InvoiceNotPending(_)
            | AppError::ShipmentNotModifiable(_)
            | AppError::ShipmentRefunded(_)
            | AppError::CreditMemoNotOpen(_) => StatusCode::CONFLICT,
            AppError::FontNotFound(_)
            | AppError::DocumentError(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Placeholders substituted into the localized message.
    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            AppError::PermissionDenied(p) => vec![("permission", p.clone())],
            AppError::ResourceNotFound(r) => vec![("resource", r.clone())],
            AppError::UniqueConstraintViolation(v) => vec![("value", v.clone())],
            AppError::InsufficientStock { sku, available } => {
                vec![("sku", sku.clone()), ("available", available.to_string())]
            }
            AppError::ProductUnavailable(p) => vec![("product", p.clone())],
            AppError::ShippingMethodUnavailable(m) => vec![("method", m.clone())],
            AppError::InvalidStatusTransition { from, to } => {
                vec![("from", from.to_string()), ("to", to.to_string())]
            }
            AppError::OrderNotCancellable(reason) => vec![("reason", reason.clone())],
            AppError::OrderStateConflict(s) => vec![("status", s.to_string())],
            AppError::QuantityExceeded { item, requested, available } => vec![
                ("item", item.clone()),
                ("requested", requested.to_string()),
                ("available", available.to_string()),
            ],
            AppError::InvoiceNotPending(s) => vec![("status", s.to_string())],
            AppError::ShipmentNotModifiable(s) => vec![("status", s.to_string())],
            AppError::ShipmentRefunded(sku) => vec![("item", sku.clone())],
            AppError::CreditMemoNotOpen(s) => vec![("status", s.to_string())],
            AppError::RefundExceedsMaximum { requested, max } => {
                vec![("requested", requested.to_string()), ("max", max.to_string())]
            }
            AppError::PaymentExceedsOutstanding { requested, outstanding } => vec![
                ("requested", requested.to_string()),
                ("outstanding", outstanding.to_string()),
            ],
            AppError::StockBelowReserved { reserved } => vec![("reserved", reserved.to_string())],
            _ => Vec::new(),
        }
    }

    /// Converts the domain error into the HTTP envelope, translated to the caller's language.
    pub fn to_api_error(self, locale: &Locale, store: &I18nStore) -> ApiError {
        let status = self.status();
        let code = self.code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, detail = ?self, "internal server error");
        }

        let message = store.translate(&locale.0, code, &self.params());

        let details = match &self {
            AppError::ValidationError(errors) => Some(validation_details(errors, locale, store)),
            _ => None,
        };

        ApiError {
            status,
            code: code.to_string(),
            message,
            details,
        }
    }
}

fn validation_details(
    errors: &validator::ValidationErrors,
    locale: &Locale,
    store: &I18nStore,
) -> serde_json::Value {
    let mut details: HashMap<String, Vec<String>> = HashMap::new();
    for (field, field_errors) in errors.field_errors() {
        let messages = field_errors
            .iter()
            .map(|e| match &e.message {
                Some(m) => store.translate(&locale.0, m, &[]),
                None => store.translate(&locale.0, &format!("validation.{}", e.code), &[]),
            })
            .collect();
        details.insert(field.to_string(), messages);
    }
    json!(details)
}

// What actually goes over the wire: { success: false, message, code, details? }
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "message": self.message,
            "code": self.code,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

// Used where no locale is at hand (middlewares): English messages.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let store = I18nStore::global();
        self.to_api_error(&Locale::default(), store).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::EmptyCart, StatusCode::BAD_REQUEST, "EMPTY_CART")]
    #[case(AppError::InvoiceAlreadyPaid, StatusCode::CONFLICT, "INVOICE_ALREADY_PAID")]
    #[case(AppError::ShipmentRefunded("SKU-1".into()), StatusCode::CONFLICT, "SHIPMENT_REFUNDED")]
    #[case(AppError::InvalidToken, StatusCode::UNAUTHORIZED, "INVALID_TOKEN")]
    #[case(AppError::ResourceNotFound("Order".into()), StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND")]
    #[case(AppError::PermissionDenied("sales:refund".into()), StatusCode::FORBIDDEN, "PERMISSION_DENIED")]
    #[case(
        AppError::InvalidStatusTransition { from: OrderStatus::Shipped, to: OrderStatus::Pending },
        StatusCode::CONFLICT,
        "INVALID_STATUS_TRANSITION"
    )]
    fn maps_status_and_code(#[case] err: AppError, #[case] status: StatusCode, #[case] code: &str) {
        assert_eq!(err.status(), status);
        assert_eq!(err.code(), code);
    }

    #[test]
    fn refund_ceiling_message_carries_amounts() {
        let err = AppError::RefundExceedsMaximum {
            requested: Decimal::new(15000, 2),
            max: Decimal::new(9950, 2),
        };
        let api = err.to_api_error(&Locale("en".into()), I18nStore::global());
        assert_eq!(api.code, "REFUND_EXCEEDS_MAXIMUM");
        assert!(api.message.contains("150.00"), "{}", api.message);
        assert!(api.message.contains("99.50"), "{}", api.message);
    }

    #[test]
    fn database_errors_do_not_leak_details() {
        let err = AppError::DatabaseError(sqlx::Error::RowNotFound);
        let api = err.to_api_error(&Locale("en".into()), I18nStore::global());
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code, "INTERNAL_ERROR");
        assert!(!api.message.to_lowercase().contains("row"));
    }
}
