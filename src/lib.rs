pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    common::response::ApiResponse,
    config::AppState,
    docs::ApiDoc,
    middleware::auth::{auth_guard, tenant_guard},
};

async fn health() -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({ "status": "ok" }))
}

/// Full HTTP surface: account, storefront (`/api/v1`) and back-office (`/api/admin`) routes.
pub fn build_router(app_state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let account_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route("/me/tenants", get(handlers::auth::get_my_tenants))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let tenancy_routes = Router::new()
        .route("/", post(handlers::tenancy::create_tenant))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    // Browsing the catalog only needs the store header.
    let storefront_public = Router::new()
        .route("/categories", get(handlers::catalog::list_categories))
        .route("/products", get(handlers::catalog::list_products))
        .route("/products/{key}", get(handlers::catalog::get_product));

    let storefront_customer = Router::new()
        .route("/cart", get(handlers::cart::get_cart).delete(handlers::cart::clear_cart))
        .route("/cart/items", post(handlers::cart::add_item))
        .route(
            "/cart/items/{line_id}",
            patch(handlers::cart::update_item).delete(handlers::cart::remove_item),
        )
        .route(
            "/wishlist",
            get(handlers::wishlist::list_wishlist).post(handlers::wishlist::add_to_wishlist),
        )
        .route("/wishlist/{product_id}", delete(handlers::wishlist::remove_from_wishlist))
        .route("/wishlist/{product_id}/move-to-cart", post(handlers::wishlist::move_to_cart))
        .route(
            "/customer/profile",
            get(handlers::customer::get_profile).put(handlers::customer::update_profile),
        )
        .route(
            "/customer/addresses",
            get(handlers::customer::list_addresses).post(handlers::customer::add_address),
        )
        .route(
            "/customer/addresses/{id}",
            put(handlers::customer::update_address).delete(handlers::customer::delete_address),
        )
        .route("/checkout", post(handlers::checkout::place_order))
        .route("/orders", get(handlers::checkout::list_my_orders))
        .route("/orders/{id}", get(handlers::checkout::get_my_order))
        .route("/orders/{id}/cancel", post(handlers::checkout::cancel_my_order))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let admin_routes = Router::new()
        // Store
        .route(
            "/settings",
            get(handlers::settings::get_settings).put(handlers::settings::update_settings),
        )
        .route("/roles", post(handlers::rbac::create_role))
        .route("/permissions", get(handlers::rbac::list_permissions))
        // Catalog
        .route("/categories", post(handlers::catalog::create_category))
        .route(
            "/products",
            get(handlers::catalog::admin_list_products).post(handlers::catalog::create_product),
        )
        .route(
            "/products/{id}",
            put(handlers::catalog::update_product).delete(handlers::catalog::archive_product),
        )
        .route("/products/{id}/stock", post(handlers::catalog::adjust_stock))
        // Orders
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/{id}", get(handlers::orders::get_order))
        .route("/orders/{id}/status", patch(handlers::orders::update_order_status))
        .route("/orders/{id}/cancel", post(handlers::orders::cancel_order))
        .route("/orders/{id}/payments", post(handlers::orders::record_payment))
        .route("/orders/{id}/payments/failed", post(handlers::orders::record_failed_payment))
        .route("/orders/{id}/transactions", get(handlers::orders::list_order_transactions))
        .route("/orders/{id}/invoices", post(handlers::invoices::create_invoice))
        .route("/orders/{id}/shipments", post(handlers::shipments::create_shipment))
        .route("/orders/{id}/refund-preview", get(handlers::credit_memos::refund_preview))
        .route("/orders/{id}/credit-memos", post(handlers::credit_memos::create_credit_memo))
        .route("/transactions", get(handlers::orders::list_transactions))
        // Invoices
        .route("/invoices", get(handlers::invoices::list_invoices))
        .route("/invoices/{id}", get(handlers::invoices::get_invoice))
        .route("/invoices/{id}/pay", post(handlers::invoices::mark_invoice_paid))
        .route("/invoices/{id}/cancel", post(handlers::invoices::cancel_invoice))
        .route("/invoices/{id}/pdf", get(handlers::documents::invoice_pdf))
        // Shipments
        .route("/shipments", get(handlers::shipments::list_shipments))
        .route("/shipments/{id}", get(handlers::shipments::get_shipment))
        .route("/shipments/{id}/tracking", put(handlers::shipments::update_tracking))
        .route("/shipments/{id}/deliver", post(handlers::shipments::mark_delivered))
        .route("/shipments/{id}/cancel", post(handlers::shipments::cancel_shipment))
        // Credit memos
        .route("/credit-memos", get(handlers::credit_memos::list_credit_memos))
        .route("/credit-memos/{id}", get(handlers::credit_memos::get_credit_memo))
        .route("/credit-memos/{id}/refund", post(handlers::credit_memos::refund_credit_memo))
        .route("/credit-memos/{id}/cancel", post(handlers::credit_memos::cancel_credit_memo))
        .route("/credit-memos/{id}/pdf", get(handlers::documents::credit_memo_pdf))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), tenant_guard));

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .nest("/api/auth", auth_routes.merge(account_routes))
        .nest("/api/tenants", tenancy_routes)
        .nest("/api/v1", storefront_public.merge(storefront_customer))
        .nest("/api/admin", admin_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}
