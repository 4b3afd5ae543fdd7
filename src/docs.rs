// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(title = "Cartxis Commerce API"),
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::get_me,
        handlers::auth::get_my_tenants,

        // --- Tenancy / RBAC / Settings ---
        handlers::tenancy::create_tenant,
        handlers::rbac::create_role,
        handlers::rbac::list_permissions,
        handlers::settings::get_settings,
        handlers::settings::update_settings,

        // --- Catalog ---
        handlers::catalog::admin_list_products,
        handlers::catalog::create_category,
        handlers::catalog::create_product,
        handlers::catalog::update_product,
        handlers::catalog::archive_product,
        handlers::catalog::adjust_stock,

        // --- Sales ---
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::update_order_status,
        handlers::orders::cancel_order,
        handlers::orders::record_payment,
        handlers::orders::record_failed_payment,
        handlers::orders::list_order_transactions,
        handlers::orders::list_transactions,

        // --- Invoices ---
        handlers::invoices::create_invoice,
        handlers::invoices::list_invoices,
        handlers::invoices::get_invoice,
        handlers::invoices::mark_invoice_paid,
        handlers::invoices::cancel_invoice,
        handlers::documents::invoice_pdf,

        // --- Shipments ---
        handlers::shipments::create_shipment,
        handlers::shipments::list_shipments,
        handlers::shipments::get_shipment,
        handlers::shipments::update_tracking,
        handlers::shipments::mark_delivered,
        handlers::shipments::cancel_shipment,

        // --- Credit memos ---
        handlers::credit_memos::refund_preview,
        handlers::credit_memos::create_credit_memo,
        handlers::credit_memos::list_credit_memos,
        handlers::credit_memos::get_credit_memo,
        handlers::credit_memos::refund_credit_memo,
        handlers::credit_memos::cancel_credit_memo,
        handlers::documents::credit_memo_pdf,
    ),
    components(
        schemas(
            // --- Auth / tenancy ---
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,
            models::tenancy::Tenant,
            models::tenancy::MemberTenant,
            models::tenancy::CreateTenantPayload,
            models::rbac::Role,
            models::rbac::Permission,
            models::rbac::CreateRolePayload,
            models::rbac::RoleResponse,
            models::settings::TenantSettings,
            models::settings::UpdateSettingsRequest,

            // --- Catalog ---
            models::catalog::ProductStatus,
            models::catalog::Category,
            models::catalog::Product,
            models::catalog::CreateCategoryPayload,
            models::catalog::CreateProductPayload,
            models::catalog::UpdateProductPayload,
            models::catalog::AdjustStockPayload,

            // --- Storefront ---
            models::cart::CartView,
            models::cart::CartLine,
            models::cart::CartTotals,
            models::cart::WishlistEntry,
            models::customer::CustomerProfile,
            models::customer::Address,
            models::customer::AddressInput,
            models::sales::PlaceOrderPayload,

            // --- Sales ---
            models::sales::OrderStatus,
            models::sales::PaymentStatus,
            models::sales::PaymentMethod,
            models::sales::ShippingMethod,
            models::sales::Order,
            models::sales::OrderItem,
            models::sales::OrderDetail,
            models::sales::UpdateOrderStatusPayload,
            models::sales::CancelOrderPayload,

            // --- Documents ---
            models::billing::ItemQuantity,
            models::billing::Invoice,
            models::billing::InvoiceItem,
            models::billing::InvoiceDetail,
            models::billing::CreateInvoicePayload,
            models::billing::MarkInvoicePaidPayload,
            models::fulfillment::Shipment,
            models::fulfillment::ShipmentItem,
            models::fulfillment::ShipmentDetail,
            models::fulfillment::CreateShipmentPayload,
            models::fulfillment::UpdateTrackingPayload,
            models::billing::CreditMemo,
            models::billing::CreditMemoItem,
            models::billing::CreditMemoDetail,
            models::billing::CreateCreditMemoPayload,
            models::billing::RefundPreview,
            models::billing::RefundableItem,
            models::billing::Transaction,
            models::billing::TransactionKind,
            models::billing::TransactionStatus,
            models::billing::RecordPaymentPayload,
            models::billing::RecordFailedPaymentPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Registration, login and the current account"),
        (name = "Tenancy", description = "Stores and their owners"),
        (name = "RBAC", description = "Roles and permissions"),
        (name = "Settings", description = "Store settings: tax, shipping, invoice header"),
        (name = "Catalog", description = "Back-office catalog maintenance"),
        (name = "Sales", description = "Orders, payments and transactions"),
        (name = "Invoices", description = "Invoices and their PDFs"),
        (name = "Shipments", description = "Shipments and tracking"),
        (name = "Credit Memos", description = "Refunds and their PDFs")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme("api_jwt", SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sales_paths_are_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/admin/orders/{id}/cancel",
            "/api/admin/orders/{id}/credit-memos",
            "/api/admin/invoices/{id}/cancel",
            "/api/admin/shipments/{id}/deliver",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_jwt"));
    }
}
