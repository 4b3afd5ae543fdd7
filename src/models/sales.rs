// src/models/sales.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::common::response::PageParams;
use crate::models::billing::{CreditMemo, Invoice, Transaction};
use crate::models::customer::AddressInput;
use crate::models::fulfillment::Shipment;

// Enums are mapped to Postgres enum types with the same snake_case labels.
macro_rules! labelled_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
pub(crate) use labelled_enum;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Refunded,
}

labelled_enum!(OrderStatus {
    Pending => "pending",
    Processing => "processing",
    OnHold => "on_hold",
    Shipped => "shipped",
    Delivered => "delivered",
    Completed => "completed",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

impl OrderStatus {
    /// Manual (back-office) transitions. `Refunded` is only reached through credit
    /// memos and `Cancelled` only through the cancel operation.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing | OnHold | Cancelled)
                | (Processing, OnHold | Shipped | Completed | Cancelled)
                | (OnHold, Pending | Processing | Cancelled)
                | (Shipped, Delivered | Completed)
                | (Delivered, Completed)
        )
    }

    pub fn is_cancellable(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing | OrderStatus::OnHold)
    }

    pub fn is_closed(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    pub fn accepts_invoices(self) -> bool {
        !self.is_closed() && self != OrderStatus::OnHold
    }

    pub fn accepts_shipments(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Shipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    PartiallyRefunded,
    Refunded,
    Failed,
}

labelled_enum!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    PartiallyRefunded => "partially_refunded",
    Refunded => "refunded",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    BankTransfer,
    Card,
    Upi,
}

labelled_enum!(PaymentMethod {
    Cod => "cod",
    BankTransfer => "bank_transfer",
    Card => "card",
    Upi => "upi",
});

impl PaymentMethod {
    /// Online methods get a pending authorization at checkout.
    pub fn is_online(self) -> bool {
        matches!(self, PaymentMethod::Card | PaymentMethod::Upi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "shipping_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    FlatRate,
    FreeShipping,
    StorePickup,
}

labelled_enum!(ShippingMethod {
    FlatRate => "flat_rate",
    FreeShipping => "free_shipping",
    StorePickup => "store_pickup",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Cancelled,
}

labelled_enum!(InvoiceStatus {
    Pending => "pending",
    Paid => "paid",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "shipment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Shipped,
    Delivered,
    Cancelled,
}

labelled_enum!(ShipmentStatus {
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "credit_memo_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CreditMemoStatus {
    Open,
    Refunded,
    Cancelled,
}

labelled_enum!(CreditMemoStatus {
    Open => "open",
    Refunded => "refunded",
    Cancelled => "cancelled",
});

// --- Order ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "ORD-7F3A9C21B4")]
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    #[schema(example = "asha@example.com")]
    pub customer_email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shipping_method: ShippingMethod,
    #[schema(example = "INR")]
    pub currency: String,
    #[schema(example = 1998.0)]
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    #[schema(example = 359.64)]
    pub tax_amount: Decimal,
    #[schema(example = 49.0)]
    pub shipping_amount: Decimal,
    #[schema(example = 2406.64)]
    pub grand_total: Decimal,
    pub total_paid: Decimal,
    pub total_refunded: Decimal,
    pub shipping_refunded: Decimal,
    pub shipping_address: serde_json::Value,
    pub billing_address: serde_json::Value,
    pub notes: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn outstanding(&self) -> Decimal {
        (self.grand_total - self.total_paid).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    #[schema(example = "TSHIRT-BLK-M")]
    pub sku: String,
    pub name: String,
    #[schema(example = 999.0)]
    pub price: Decimal,
    #[schema(example = 2)]
    pub quantity: i32,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub row_total: Decimal,
    pub qty_invoiced: i32,
    pub qty_shipped: i32,
    pub qty_refunded: i32,
    pub qty_cancelled: i32,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn qty_to_invoice(&self) -> i32 {
        (self.quantity - self.qty_invoiced - self.qty_cancelled).max(0)
    }

    /// Refunded units are taken from the unshipped ones first.
    pub fn qty_to_ship(&self) -> i32 {
        (self.quantity - self.qty_shipped - self.qty_refunded - self.qty_cancelled).max(0)
    }

    pub fn qty_to_refund(&self) -> i32 {
        (self.quantity - self.qty_refunded - self.qty_cancelled).max(0)
    }
}

/// Everything the back-office order page shows.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub header: Order,
    pub items: Vec<OrderItem>,
    pub invoices: Vec<Invoice>,
    pub shipments: Vec<Shipment>,
    pub credit_memos: Vec<CreditMemo>,
    pub transactions: Vec<Transaction>,
}

/// Filters for the order grid.
#[derive(Debug, Default, Clone)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub customer_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Matches the order number or the customer e-mail.
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl OrderListQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams { page: self.page, per_page: self.per_page }
    }

    pub fn filter(&self) -> OrderFilter {
        OrderFilter {
            status: self.status,
            payment_status: self.payment_status,
            customer_id: None,
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
        }
    }
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusPayload {
    pub status: OrderStatus,
    #[validate(length(max = 1000, message = "validation.length"))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderPayload {
    #[validate(length(max = 1000, message = "validation.length"))]
    pub reason: Option<String>,
}

/// Checkout form. A saved address id or an inline address is required for shipping;
/// billing defaults to the shipping address.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "shipping_address_given"))]
pub struct PlaceOrderPayload {
    pub payment_method: PaymentMethod,
    pub shipping_method: ShippingMethod,
    pub shipping_address_id: Option<Uuid>,
    #[validate(nested)]
    pub shipping_address: Option<AddressInput>,
    pub billing_address_id: Option<Uuid>,
    #[validate(nested)]
    pub billing_address: Option<AddressInput>,
    #[validate(length(max = 1000, message = "validation.length"))]
    pub notes: Option<String>,
}

fn shipping_address_given(payload: &PlaceOrderPayload) -> Result<(), ValidationError> {
    if payload.shipping_address_id.is_none() && payload.shipping_address.is_none() {
        return Err(ValidationError::new("address_required")
            .with_message("validation.address_required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use OrderStatus::*;

    #[rstest]
    #[case(Pending, Processing, true)]
    #[case(Pending, OnHold, true)]
    #[case(Processing, Shipped, true)]
    #[case(OnHold, Pending, true)]
    #[case(Shipped, Delivered, true)]
    #[case(Delivered, Completed, true)]
    #[case(Pending, Shipped, false)]
    #[case(Shipped, Pending, false)]
    #[case(Completed, Processing, false)]
    #[case(Cancelled, Pending, false)]
    #[case(Refunded, Completed, false)]
    #[case(Processing, Refunded, false)]
    #[case(Pending, Pending, false)]
    fn transition_table(#[case] from: OrderStatus, #[case] to: OrderStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed, "{from} -> {to}");
    }

    #[test]
    fn only_open_orders_are_cancellable() {
        let cancellable: Vec<_> = [Pending, Processing, OnHold, Shipped, Delivered, Completed, Cancelled, Refunded]
            .into_iter()
            .filter(|s| s.is_cancellable())
            .collect();
        assert_eq!(cancellable, vec![Pending, Processing, OnHold]);
    }

    #[test]
    fn checkout_needs_a_shipping_address() {
        let payload: PlaceOrderPayload = serde_json::from_value(serde_json::json!({
            "paymentMethod": "cod",
            "shippingMethod": "flat_rate"
        }))
        .unwrap();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn blank_search_is_ignored() {
        let query = OrderListQuery { search: Some("  ".into()), ..Default::default() };
        assert!(query.filter().search.is_none());
    }

    #[test]
    fn labels_match_serde_and_display() {
        assert_eq!(OnHold.to_string(), "on_hold");
        assert_eq!(serde_json::to_value(OnHold).unwrap(), "on_hold");
        assert_eq!(PaymentStatus::PartiallyRefunded.as_str(), "partially_refunded");
        assert_eq!(
            serde_json::from_str::<PaymentMethod>("\"bank_transfer\"").unwrap(),
            PaymentMethod::BankTransfer
        );
    }

    fn item(quantity: i32, invoiced: i32, shipped: i32, refunded: i32, cancelled: i32) -> OrderItem {
        OrderItem {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            order_id: Uuid::nil(),
            product_id: None,
            sku: "SKU".into(),
            name: "Item".into(),
            price: Decimal::ONE,
            quantity,
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            row_total: Decimal::ONE,
            qty_invoiced: invoiced,
            qty_shipped: shipped,
            qty_refunded: refunded,
            qty_cancelled: cancelled,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn open_quantities() {
        let i = item(5, 2, 1, 1, 0);
        assert_eq!(i.qty_to_invoice(), 3);
        assert_eq!(i.qty_to_ship(), 3);
        assert_eq!(i.qty_to_refund(), 4);

        // Everything shipped, then one unit returned: nothing left to ship.
        let returned = item(3, 3, 3, 1, 0);
        assert_eq!(returned.qty_to_ship(), 0);
        assert_eq!(returned.qty_to_refund(), 2);
    }
}
