// src/services/totals.rs
//
// Money and quantity arithmetic shared by checkout, invoices, shipments and credit memos.
// Every amount is rounded to 2 places, midpoint away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    common::error::AppError,
    models::{
        billing::ItemQuantity,
        sales::{OrderItem, PaymentStatus, ShippingMethod},
        settings::TenantSettings,
    },
};
use std::collections::BTreeMap;
use uuid::Uuid;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn line_subtotal(price: Decimal, qty: i32) -> Decimal {
    round_money(price * Decimal::from(qty))
}

pub fn line_tax(taxable: Decimal, rate_percent: Decimal) -> Decimal {
    round_money(taxable * rate_percent / HUNDRED)
}

/// Share of `total` for `qty` units after `processed` units already took theirs.
///
/// Portions are differences of cumulative rounded amounts, so any split of
/// `ordered` units adds up to exactly `total`.
pub fn prorate(total: Decimal, processed: i32, qty: i32, ordered: i32) -> Decimal {
    if ordered <= 0 || qty <= 0 {
        return Decimal::ZERO;
    }
    let upto = |units: i32| round_money(total * Decimal::from(units.min(ordered)) / Decimal::from(ordered));
    upto(processed + qty) - upto(processed)
}

pub fn grand_total(subtotal: Decimal, discount: Decimal, tax: Decimal, shipping: Decimal) -> Decimal {
    round_money(subtotal - discount + tax + shipping)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub row_total: Decimal,
}

impl LineAmounts {
    pub const ZERO: LineAmounts = LineAmounts {
        subtotal: Decimal::ZERO,
        discount: Decimal::ZERO,
        tax: Decimal::ZERO,
        row_total: Decimal::ZERO,
    };

    pub fn add(self, other: LineAmounts) -> LineAmounts {
        LineAmounts {
            subtotal: self.subtotal + other.subtotal,
            discount: self.discount + other.discount,
            tax: self.tax + other.tax,
            row_total: self.row_total + other.row_total,
        }
    }
}

/// Amounts of a new order line. Tax applies to the discounted subtotal.
pub fn order_line(price: Decimal, qty: i32, discount: Decimal, tax_rate: Decimal) -> LineAmounts {
    let subtotal = line_subtotal(price, qty);
    let discount = round_money(discount.min(subtotal));
    let tax = line_tax(subtotal - discount, tax_rate);
    LineAmounts { subtotal, discount, tax, row_total: subtotal - discount + tax }
}

/// Amounts of `qty` units of an order line, after `processed` units were already billed.
pub fn item_portion(item: &OrderItem, processed: i32, qty: i32) -> LineAmounts {
    let subtotal = line_subtotal(item.price, qty);
    let discount = prorate(item.discount_amount, processed, qty, item.quantity);
    let tax = prorate(item.tax_amount, processed, qty, item.quantity);
    LineAmounts { subtotal, discount, tax, row_total: subtotal - discount + tax }
}

/// Shipping charge for the chosen method. `free_shipping` is only offered above the threshold.
pub fn shipping_for(
    method: ShippingMethod,
    subtotal: Decimal,
    settings: &TenantSettings,
) -> Result<Decimal, AppError> {
    let qualifies_for_free = settings
        .free_shipping_threshold
        .is_some_and(|threshold| subtotal >= threshold);

    match method {
        ShippingMethod::FlatRate if qualifies_for_free => Ok(Decimal::ZERO),
        ShippingMethod::FlatRate => Ok(round_money(settings.flat_shipping_rate)),
        ShippingMethod::FreeShipping if qualifies_for_free => Ok(Decimal::ZERO),
        ShippingMethod::FreeShipping => {
            Err(AppError::ShippingMethodUnavailable(method.to_string()))
        }
        ShippingMethod::StorePickup => Ok(Decimal::ZERO),
    }
}

/// How refunding `qty` units of a line moves stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundStockEffect {
    /// Units never shipped: their reservation is released.
    pub release_reserved: i32,
    /// Units already shipped: back on the shelf when the memo restocks.
    pub return_to_stock: i32,
}

/// Unshipped units are consumed first.
pub fn refund_stock_effect(item: &OrderItem, qty: i32) -> RefundStockEffect {
    let open = |refunded: i32| {
        (item.quantity - item.qty_shipped - item.qty_cancelled - refunded).max(0)
    };
    let release_reserved = open(item.qty_refunded) - open(item.qty_refunded + qty);
    RefundStockEffect {
        release_reserved,
        return_to_stock: qty - release_reserved,
    }
}

pub fn derive_payment_status(
    grand_total: Decimal,
    total_paid: Decimal,
    total_refunded: Decimal,
    current: PaymentStatus,
) -> PaymentStatus {
    if total_refunded > Decimal::ZERO {
        if total_refunded >= total_paid {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        }
    } else if total_paid > Decimal::ZERO && total_paid >= grand_total {
        PaymentStatus::Paid
    } else if total_paid.is_zero() && current == PaymentStatus::Failed {
        PaymentStatus::Failed
    } else {
        PaymentStatus::Pending
    }
}

/// Captured money not yet refunded nor held by open credit memos.
pub fn max_refundable(total_paid: Decimal, total_refunded: Decimal, open_memo_total: Decimal) -> Decimal {
    (total_paid - total_refunded - open_memo_total).max(Decimal::ZERO)
}

pub fn shipping_refundable(
    shipping_amount: Decimal,
    shipping_refunded: Decimal,
    open_memo_shipping: Decimal,
) -> Decimal {
    (shipping_amount - shipping_refunded - open_memo_shipping).max(Decimal::ZERO)
}

pub fn credit_memo_total(
    lines: LineAmounts,
    shipping_refund: Decimal,
    adjustment_refund: Decimal,
    adjustment_fee: Decimal,
) -> Decimal {
    round_money(lines.row_total + shipping_refund + adjustment_refund - adjustment_fee)
}

/// Resolves the lines a document covers. `None` takes every open unit; an explicit
/// list is checked against `open` (requests for the same line add up).
pub fn select_quantities<'a, F>(
    items: &'a [OrderItem],
    requested: Option<&[ItemQuantity]>,
    open: F,
) -> Result<Vec<(&'a OrderItem, i32)>, AppError>
where
    F: Fn(&OrderItem) -> i32,
{
    let Some(requested) = requested else {
        return Ok(items
            .iter()
            .map(|item| (item, open(item)))
            .filter(|(_, qty)| *qty > 0)
            .collect());
    };

    let mut wanted: BTreeMap<Uuid, i32> = BTreeMap::new();
    for line in requested {
        let qty = wanted.entry(line.order_item_id).or_default();
        *qty = qty.saturating_add(line.quantity);
    }

    let mut selected = Vec::with_capacity(wanted.len());
    for (item_id, qty) in wanted {
        let item = items
            .iter()
            .find(|i| i.id == item_id)
            .ok_or_else(|| AppError::ResourceNotFound("Order item".into()))?;
        let available = open(item);
        if qty > available {
            return Err(AppError::QuantityExceeded {
                item: item.sku.clone(),
                requested: qty,
                available,
            });
        }
        if qty > 0 {
            selected.push((item, qty));
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn d(units: i64, scale: u32) -> Decimal {
        Decimal::new(units, scale)
    }

    fn item(quantity: i32, shipped: i32, refunded: i32, cancelled: i32) -> OrderItem {
        OrderItem {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            order_id: Uuid::nil(),
            product_id: None,
            sku: "SKU-1".into(),
            name: "Widget".into(),
            price: d(3333, 2),
            quantity,
            discount_amount: d(1000, 2),
            tax_amount: d(1799, 2),
            row_total: d(10799, 2),
            qty_invoiced: 0,
            qty_shipped: shipped,
            qty_refunded: refunded,
            qty_cancelled: cancelled,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(d(1005, 3), d(101, 2))]
    #[case(d(-1005, 3), d(-101, 2))]
    #[case(d(1004, 3), d(100, 2))]
    #[case(d(5, 0), d(500, 2))]
    fn rounds_half_away_from_zero(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_money(input), expected);
    }

    #[rstest]
    #[case(vec![1, 1, 1])]
    #[case(vec![2, 1])]
    #[case(vec![1, 2])]
    #[case(vec![3])]
    fn proration_conserves_the_total(#[case] splits: Vec<i32>) {
        let total = d(1000, 2);
        let mut processed = 0;
        let mut sum = Decimal::ZERO;
        for qty in splits {
            sum += prorate(total, processed, qty, 3);
            processed += qty;
        }
        assert_eq!(sum, total);
    }

    #[test]
    fn proration_spreads_cents() {
        // 10.00 over 3 units: 3.33, 3.34, 3.33
        let total = d(1000, 2);
        assert_eq!(prorate(total, 0, 1, 3), d(333, 2));
        assert_eq!(prorate(total, 1, 1, 3), d(334, 2));
        assert_eq!(prorate(total, 2, 1, 3), d(333, 2));
        assert_eq!(prorate(total, 0, 0, 3), Decimal::ZERO);
        assert_eq!(prorate(total, 0, 1, 0), Decimal::ZERO);
    }

    #[test]
    fn order_line_taxes_discounted_subtotal() {
        let line = order_line(d(99900, 2), 2, d(19980, 2), d(18, 0));
        assert_eq!(line.subtotal, d(199800, 2));
        assert_eq!(line.discount, d(19980, 2));
        assert_eq!(line.tax, d(32368, 2));
        assert_eq!(line.row_total, line.subtotal - line.discount + line.tax);
    }

    #[test]
    fn item_portions_add_up_to_the_line() {
        let it = item(3, 0, 0, 0);
        let first = item_portion(&it, 0, 2);
        let rest = item_portion(&it, 2, 1);
        let whole = first.add(rest);
        assert_eq!(whole.discount, it.discount_amount);
        assert_eq!(whole.tax, it.tax_amount);
        assert_eq!(whole.subtotal, line_subtotal(it.price, 3));
    }

    #[test]
    fn grand_total_formula() {
        assert_eq!(grand_total(d(1000, 0), d(100, 0), d(162, 0), d(49, 0)), d(1111, 0));
    }

    fn settings(flat: Decimal, threshold: Option<Decimal>) -> TenantSettings {
        TenantSettings {
            flat_shipping_rate: flat,
            free_shipping_threshold: threshold,
            ..TenantSettings::defaults(Uuid::nil())
        }
    }

    #[rstest]
    #[case(ShippingMethod::FlatRate, d(1000, 0), None, Some(d(49, 0)))]
    #[case(ShippingMethod::FlatRate, d(1500, 0), Some(d(1500, 0)), Some(Decimal::ZERO))]
    #[case(ShippingMethod::FreeShipping, d(1499, 0), Some(d(1500, 0)), None)]
    #[case(ShippingMethod::FreeShipping, d(2000, 0), Some(d(1500, 0)), Some(Decimal::ZERO))]
    #[case(ShippingMethod::FreeShipping, d(2000, 0), None, None)]
    #[case(ShippingMethod::StorePickup, d(10, 0), None, Some(Decimal::ZERO))]
    fn shipping_rules(
        #[case] method: ShippingMethod,
        #[case] subtotal: Decimal,
        #[case] threshold: Option<Decimal>,
        #[case] expected: Option<Decimal>,
    ) {
        let result = shipping_for(method, subtotal, &settings(d(49, 0), threshold));
        match expected {
            Some(amount) => assert_eq!(result.unwrap(), amount),
            None => assert!(matches!(result, Err(AppError::ShippingMethodUnavailable(_)))),
        }
    }

    #[rstest]
    // Nothing shipped: every refunded unit only frees its reservation.
    #[case(item(3, 0, 0, 0), 2, 2, 0)]
    // Two of three shipped: the single open unit goes first, then a shipped one.
    #[case(item(3, 2, 0, 0), 2, 1, 1)]
    // Open unit already refunded earlier: the rest are physical returns.
    #[case(item(3, 2, 1, 0), 2, 0, 2)]
    // Fully shipped.
    #[case(item(4, 4, 0, 0), 3, 0, 3)]
    fn refunds_consume_unshipped_units_first(
        #[case] it: OrderItem,
        #[case] qty: i32,
        #[case] release: i32,
        #[case] returned: i32,
    ) {
        let effect = refund_stock_effect(&it, qty);
        assert_eq!(effect.release_reserved, release);
        assert_eq!(effect.return_to_stock, returned);
    }

    #[rstest]
    #[case(d(100, 0), Decimal::ZERO, Decimal::ZERO, PaymentStatus::Pending, PaymentStatus::Pending)]
    #[case(d(100, 0), Decimal::ZERO, Decimal::ZERO, PaymentStatus::Failed, PaymentStatus::Failed)]
    #[case(d(100, 0), d(40, 0), Decimal::ZERO, PaymentStatus::Failed, PaymentStatus::Pending)]
    #[case(d(100, 0), d(100, 0), Decimal::ZERO, PaymentStatus::Pending, PaymentStatus::Paid)]
    #[case(d(100, 0), d(100, 0), d(30, 0), PaymentStatus::Paid, PaymentStatus::PartiallyRefunded)]
    #[case(d(100, 0), d(100, 0), d(100, 0), PaymentStatus::PartiallyRefunded, PaymentStatus::Refunded)]
    fn payment_status_follows_money(
        #[case] total: Decimal,
        #[case] paid: Decimal,
        #[case] refunded: Decimal,
        #[case] current: PaymentStatus,
        #[case] expected: PaymentStatus,
    ) {
        assert_eq!(derive_payment_status(total, paid, refunded, current), expected);
    }

    #[test]
    fn refund_ceiling_counts_open_memos_and_never_goes_negative() {
        assert_eq!(max_refundable(d(500, 0), d(100, 0), d(150, 0)), d(250, 0));
        assert_eq!(max_refundable(d(100, 0), d(100, 0), d(10, 0)), Decimal::ZERO);
        assert_eq!(shipping_refundable(d(49, 0), d(49, 0), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn memo_total_includes_adjustments() {
        let lines = LineAmounts { subtotal: d(100, 0), discount: d(10, 0), tax: d(9, 0), row_total: d(99, 0) };
        assert_eq!(credit_memo_total(lines, d(49, 0), d(5, 0), d(20, 0)), d(133, 0));
        assert_eq!(credit_memo_total(LineAmounts::ZERO, Decimal::ZERO, Decimal::ZERO, d(1, 0)), d(-1, 0));
    }

    fn with_id(mut it: OrderItem, id: u128, invoiced: i32) -> OrderItem {
        it.id = Uuid::from_u128(id);
        it.qty_invoiced = invoiced;
        it
    }

    #[test]
    fn omitted_lines_mean_everything_open() {
        let items = vec![with_id(item(3, 0, 0, 0), 1, 3), with_id(item(2, 0, 0, 0), 2, 0)];
        let selected = select_quantities(&items, None, OrderItem::qty_to_invoice).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0.id, Uuid::from_u128(2));
        assert_eq!(selected[0].1, 2);
    }

    #[test]
    fn requested_lines_add_up_and_are_capped() {
        let items = vec![with_id(item(3, 0, 0, 0), 1, 1)];
        let req = |qty| ItemQuantity { order_item_id: Uuid::from_u128(1), quantity: qty };

        let ok = select_quantities(&items, Some(&[req(1), req(1)]), OrderItem::qty_to_invoice).unwrap();
        assert_eq!(ok[0].1, 2);

        let err = select_quantities(&items, Some(&[req(2), req(1)]), OrderItem::qty_to_invoice).unwrap_err();
        assert!(matches!(err, AppError::QuantityExceeded { requested: 3, available: 2, .. }));
    }

    #[test]
    fn huge_requests_are_refused_not_wrapped() {
        let items = vec![with_id(item(3, 0, 0, 0), 1, 0)];
        let req = |qty| ItemQuantity { order_item_id: Uuid::from_u128(1), quantity: qty };
        let err = select_quantities(&items, Some(&[req(i32::MAX), req(i32::MAX)]), OrderItem::qty_to_invoice)
            .unwrap_err();
        assert!(matches!(err, AppError::QuantityExceeded { requested: i32::MAX, available: 3, .. }));
    }

    #[test]
    fn unknown_lines_are_rejected() {
        let items = vec![with_id(item(3, 0, 0, 0), 1, 0)];
        let req = [ItemQuantity { order_item_id: Uuid::from_u128(9), quantity: 1 }];
        let err = select_quantities(&items, Some(&req), OrderItem::qty_to_invoice).unwrap_err();
        assert!(matches!(err, AppError::ResourceNotFound(_)));
    }
}
