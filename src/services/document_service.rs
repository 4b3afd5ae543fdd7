// src/services/document_service.rs

use genpdf::{elements, style, Alignment, Element};
use image::Luma;
use qrcode::QrCode;
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::{
    common::error::AppError,
    models::{
        billing::{CreditMemoDetail, InvoiceDetail},
        customer::AddressInput,
        sales::{InvoiceStatus, Order},
        settings::TenantSettings,
    },
};

/// A rendered PDF, served as an attachment.
#[derive(Debug)]
pub struct RenderedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Builds a `upi://pay` link for the amount due; payment apps read it from the QR code.
pub fn upi_payment_uri(upi_id: &str, payee: &str, amount: Decimal, currency: &str, note: &str) -> String {
    format!(
        "upi://pay?pa={}&pn={}&am={:.2}&cu={}&tn={}",
        urlencoding::encode(upi_id),
        urlencoding::encode(payee),
        amount,
        urlencoding::encode(currency),
        urlencoding::encode(note),
    )
}

// Everything printed on a document, detached from the database rows so it can be
// moved to a blocking thread.
#[derive(Debug)]
struct Layout {
    title: String,
    company: String,
    company_lines: Vec<String>,
    reference_lines: Vec<String>,
    bill_to: Vec<String>,
    rows: Vec<[String; 4]>,
    totals: Vec<(String, String)>,
    payment_qr: Option<(String, String)>,
    footer: Option<String>,
}

fn money(currency: &str, amount: Decimal) -> String {
    format!("{currency} {amount:.2}")
}

fn address_lines(value: &serde_json::Value) -> Vec<String> {
    let Ok(address) = serde_json::from_value::<AddressInput>(value.clone()) else {
        return Vec::new();
    };

    let mut lines = vec![address.name, address.line1];
    lines.extend(address.line2);
    let locality = match address.state {
        Some(state) => format!("{}, {} {}", address.city, state, address.postal_code),
        None => format!("{} {}", address.city, address.postal_code),
    };
    lines.push(locality);
    lines.push(address.country);
    lines.extend(address.phone);
    lines
}

fn store_header(settings: &TenantSettings) -> (String, Vec<String>) {
    let company = settings.company_name.clone().unwrap_or_else(|| "Cartxis Store".to_string());
    let mut lines = Vec::new();
    lines.extend(settings.address.clone());
    if let Some(tax_id) = &settings.tax_id {
        lines.push(format!("GSTIN: {tax_id}"));
    }
    lines.extend(settings.email.clone());
    lines.extend(settings.phone.clone());
    (company, lines)
}

fn invoice_layout(settings: &TenantSettings, order: &Order, detail: &InvoiceDetail) -> Layout {
    let currency = order.currency.as_str();
    let invoice = &detail.header;
    let (company, company_lines) = store_header(settings);

    let rows = detail
        .items
        .iter()
        .map(|item| {
            [
                format!("{} ({})", item.name, item.sku),
                item.quantity.to_string(),
                money(currency, item.price),
                money(currency, item.row_total),
            ]
        })
        .collect();

    let mut totals = vec![("Subtotal".to_string(), money(currency, invoice.subtotal))];
    if !invoice.discount_amount.is_zero() {
        totals.push(("Discount".to_string(), format!("-{}", money(currency, invoice.discount_amount))));
    }
    totals.push(("Tax".to_string(), money(currency, invoice.tax_amount)));
    totals.push(("Shipping".to_string(), money(currency, invoice.shipping_amount)));
    totals.push(("Grand total".to_string(), money(currency, invoice.grand_total)));

    let payment_qr = match (&settings.upi_id, invoice.status) {
        (Some(upi_id), InvoiceStatus::Pending) => Some((
            format!("Pay with UPI: {upi_id}"),
            upi_payment_uri(upi_id, &company, invoice.grand_total, currency, &invoice.invoice_number),
        )),
        _ => None,
    };

    Layout {
        title: format!("INVOICE {}", invoice.invoice_number),
        company,
        company_lines,
        reference_lines: vec![
            format!("Order: {}", detail.order_number),
            format!("Date: {}", invoice.created_at.format("%d %b %Y")),
            format!("Status: {}", invoice.status),
        ],
        bill_to: address_lines(&order.billing_address),
        rows,
        totals,
        payment_qr,
        footer: invoice.notes.clone(),
    }
}

fn credit_memo_layout(settings: &TenantSettings, order: &Order, detail: &CreditMemoDetail) -> Layout {
    let currency = order.currency.as_str();
    let memo = &detail.header;
    let (company, company_lines) = store_header(settings);

    let rows = detail
        .items
        .iter()
        .map(|item| {
            [
                format!("{} ({})", item.name, item.sku),
                item.quantity.to_string(),
                money(currency, item.price),
                money(currency, item.row_total),
            ]
        })
        .collect();

    let mut totals = vec![("Subtotal".to_string(), money(currency, memo.subtotal))];
    if !memo.discount_amount.is_zero() {
        totals.push(("Discount".to_string(), format!("-{}", money(currency, memo.discount_amount))));
    }
    totals.push(("Tax".to_string(), money(currency, memo.tax_amount)));
    totals.push(("Shipping refund".to_string(), money(currency, memo.shipping_refund)));
    if !memo.adjustment_refund.is_zero() {
        totals.push(("Adjustment refund".to_string(), money(currency, memo.adjustment_refund)));
    }
    if !memo.adjustment_fee.is_zero() {
        totals.push(("Adjustment fee".to_string(), format!("-{}", money(currency, memo.adjustment_fee))));
    }
    totals.push(("Total refunded".to_string(), money(currency, memo.grand_total)));

    Layout {
        title: format!("CREDIT MEMO {}", memo.credit_memo_number),
        company,
        company_lines,
        reference_lines: vec![
            format!("Order: {}", detail.order_number),
            format!("Date: {}", memo.created_at.format("%d %b %Y")),
            format!("Status: {}", memo.status),
        ],
        bill_to: address_lines(&order.billing_address),
        rows,
        totals,
        payment_qr: None,
        footer: memo.reason.clone().map(|reason| format!("Reason: {reason}")),
    }
}

fn render_error(e: impl std::fmt::Display) -> AppError {
    AppError::DocumentError(e.to_string())
}

#[derive(Clone)]
pub struct DocumentService {
    font_dir: PathBuf,
    font_family: String,
}

impl DocumentService {
    pub fn new(font_dir: impl Into<PathBuf>, font_family: impl Into<String>) -> Self {
        Self {
            font_dir: font_dir.into(),
            font_family: font_family.into(),
        }
    }

    pub async fn render_invoice(
        &self,
        settings: &TenantSettings,
        order: &Order,
        detail: &InvoiceDetail,
    ) -> Result<RenderedDocument, AppError> {
        let layout = invoice_layout(settings, order, detail);
        let filename = format!("{}.pdf", detail.header.invoice_number);
        self.render(filename, layout).await
    }

    pub async fn render_credit_memo(
        &self,
        settings: &TenantSettings,
        order: &Order,
        detail: &CreditMemoDetail,
    ) -> Result<RenderedDocument, AppError> {
        let layout = credit_memo_layout(settings, order, detail);
        let filename = format!("{}.pdf", detail.header.credit_memo_number);
        self.render(filename, layout).await
    }

    // Font loading and layout are blocking work.
    async fn render(&self, filename: String, layout: Layout) -> Result<RenderedDocument, AppError> {
        let font_dir = self.font_dir.clone();
        let font_family = self.font_family.clone();

        let bytes = tokio::task::spawn_blocking(move || render_pdf(&font_dir, &font_family, layout))
            .await
            .map_err(|e| AppError::InternalServerError(e.into()))??;

        tracing::debug!(filename = %filename, size = bytes.len(), "document rendered");
        Ok(RenderedDocument { filename, bytes })
    }
}

fn render_pdf(font_dir: &std::path::Path, font_family: &str, layout: Layout) -> Result<Vec<u8>, AppError> {
    let fonts = genpdf::fonts::from_files(font_dir, font_family, None)
        .map_err(|_| AppError::FontNotFound(format!("{font_family} in {}", font_dir.display())))?;

    let mut doc = genpdf::Document::new(fonts);
    doc.set_title(layout.title.clone());
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    let small = style::Style::new().with_font_size(9);
    let bold = style::Style::new().bold();

    doc.push(elements::Paragraph::new(layout.company).styled(style::Style::new().bold().with_font_size(18)));
    for line in layout.company_lines {
        doc.push(elements::Paragraph::new(line).styled(small));
    }
    doc.push(elements::Break::new(1.5));

    doc.push(elements::Paragraph::new(layout.title).styled(style::Style::new().bold().with_font_size(14)));
    for line in layout.reference_lines {
        doc.push(elements::Paragraph::new(line));
    }

    if !layout.bill_to.is_empty() {
        doc.push(elements::Break::new(1));
        doc.push(elements::Paragraph::new("Bill to").styled(bold));
        for line in layout.bill_to {
            doc.push(elements::Paragraph::new(line).styled(small));
        }
    }
    doc.push(elements::Break::new(2));

    let mut table = elements::TableLayout::new(vec![5, 1, 2, 2]);
    table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));
    table
        .row()
        .element(elements::Paragraph::new("Item").styled(bold))
        .element(elements::Paragraph::new("Qty").styled(bold))
        .element(elements::Paragraph::new("Price").styled(bold))
        .element(elements::Paragraph::new("Total").styled(bold))
        .push()
        .map_err(render_error)?;
    for [name, qty, price, total] in layout.rows {
        table
            .row()
            .element(elements::Paragraph::new(name))
            .element(elements::Paragraph::new(qty))
            .element(elements::Paragraph::new(price))
            .element(elements::Paragraph::new(total))
            .push()
            .map_err(render_error)?;
    }
    doc.push(table);
    doc.push(elements::Break::new(1));

    let last = layout.totals.len().saturating_sub(1);
    for (i, (label, amount)) in layout.totals.into_iter().enumerate() {
        let mut line = elements::Paragraph::new(format!("{label}: {amount}"));
        line.set_alignment(Alignment::Right);
        if i == last {
            doc.push(line.styled(style::Style::new().bold().with_font_size(12)));
        } else {
            doc.push(line);
        }
    }

    if let Some((caption, payload)) = layout.payment_qr {
        doc.push(elements::Break::new(2));
        doc.push(elements::Paragraph::new(caption).styled(bold));

        let code = QrCode::new(payload.as_bytes()).map_err(render_error)?;
        let qr = image::DynamicImage::ImageLuma8(code.render::<Luma<u8>>().build());
        let image = elements::Image::from_dynamic_image(qr)
            .map_err(render_error)?
            .with_scale(genpdf::Scale::new(0.5, 0.5));
        doc.push(image);
    }

    if let Some(footer) = layout.footer {
        doc.push(elements::Break::new(2));
        doc.push(elements::Paragraph::new(footer).styled(style::Style::new().italic().with_font_size(8)));
    }

    let mut buffer = Vec::new();
    doc.render(&mut buffer).map_err(render_error)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::billing::{Invoice, InvoiceItem};
    use crate::models::sales::{OrderStatus, PaymentMethod, PaymentStatus, ShippingMethod};
    use chrono::Utc;
    use uuid::Uuid;

    fn settings(upi_id: Option<&str>) -> TenantSettings {
        TenantSettings {
            company_name: Some("Chai & Co".into()),
            upi_id: upi_id.map(str::to_string),
            ..TenantSettings::defaults(Uuid::nil())
        }
    }

    fn order() -> Order {
        Order {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            order_number: "ORD-AAAA000001".into(),
            customer_id: None,
            customer_email: "asha@example.com".into(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Upi,
            shipping_method: ShippingMethod::FlatRate,
            currency: "INR".into(),
            subtotal: Decimal::new(50000, 2),
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::new(9000, 2),
            shipping_amount: Decimal::new(4900, 2),
            grand_total: Decimal::new(63900, 2),
            total_paid: Decimal::ZERO,
            total_refunded: Decimal::ZERO,
            shipping_refunded: Decimal::ZERO,
            shipping_address: serde_json::Value::Null,
            billing_address: serde_json::json!({
                "name": "Asha Rao",
                "line1": "12 MG Road",
                "city": "Bengaluru",
                "state": "KA",
                "postalCode": "560001",
                "country": "IN"
            }),
            notes: None,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn invoice(status: InvoiceStatus) -> InvoiceDetail {
        let now = Utc::now();
        InvoiceDetail {
            header: Invoice {
                id: Uuid::new_v4(),
                tenant_id: Uuid::nil(),
                order_id: Uuid::nil(),
                invoice_number: "INV-BBBB000002".into(),
                status,
                subtotal: Decimal::new(50000, 2),
                discount_amount: Decimal::ZERO,
                tax_amount: Decimal::new(9000, 2),
                shipping_amount: Decimal::new(4900, 2),
                grand_total: Decimal::new(63900, 2),
                notes: None,
                paid_at: None,
                created_at: now,
                updated_at: now,
            },
            order_number: "ORD-AAAA000001".into(),
            items: vec![InvoiceItem {
                id: Uuid::new_v4(),
                tenant_id: Uuid::nil(),
                invoice_id: Uuid::nil(),
                order_item_id: Uuid::nil(),
                sku: "TEA-500".into(),
                name: "Assam tea 500g".into(),
                price: Decimal::new(25000, 2),
                quantity: 2,
                discount_amount: Decimal::ZERO,
                tax_amount: Decimal::new(9000, 2),
                row_total: Decimal::new(59000, 2),
            }],
        }
    }

    #[test]
    fn upi_uri_is_encoded() {
        let uri = upi_payment_uri("chai@okaxis", "Chai & Co", Decimal::new(63900, 2), "INR", "INV-1");
        assert_eq!(uri, "upi://pay?pa=chai%40okaxis&pn=Chai%20%26%20Co&am=639.00&cu=INR&tn=INV-1");
    }

    #[test]
    fn pending_invoices_carry_a_payment_code() {
        let layout = invoice_layout(&settings(Some("chai@okaxis")), &order(), &invoice(InvoiceStatus::Pending));
        let (_, payload) = layout.payment_qr.expect("payment code");
        assert!(payload.contains("am=639.00"));
        assert!(payload.ends_with("tn=INV-BBBB000002"));

        let paid = invoice_layout(&settings(Some("chai@okaxis")), &order(), &invoice(InvoiceStatus::Paid));
        assert!(paid.payment_qr.is_none());

        let no_upi = invoice_layout(&settings(None), &order(), &invoice(InvoiceStatus::Pending));
        assert!(no_upi.payment_qr.is_none());
    }

    #[test]
    fn invoice_lines_and_totals() {
        let layout = invoice_layout(&settings(None), &order(), &invoice(InvoiceStatus::Pending));
        assert_eq!(layout.title, "INVOICE INV-BBBB000002");
        assert_eq!(layout.rows[0][1], "2");
        assert_eq!(layout.rows[0][3], "INR 590.00");
        // No discount line when nothing was discounted.
        let labels: Vec<_> = layout.totals.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, ["Subtotal", "Tax", "Shipping", "Grand total"]);
        assert_eq!(layout.totals.last().map(|(_, a)| a.as_str()), Some("INR 639.00"));
    }

    #[test]
    fn billing_address_is_printed() {
        let layout = invoice_layout(&settings(None), &order(), &invoice(InvoiceStatus::Pending));
        assert_eq!(
            layout.bill_to,
            ["Asha Rao", "12 MG Road", "Bengaluru, KA 560001", "IN"]
        );
        assert!(address_lines(&serde_json::Value::Null).is_empty());
    }

    #[tokio::test]
    async fn missing_fonts_are_reported() {
        let service = DocumentService::new("/nonexistent/fonts", "Roboto");
        let err = service
            .render_invoice(&settings(None), &order(), &invoice(InvoiceStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FontNotFound(_)));
    }
}
