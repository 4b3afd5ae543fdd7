// src/handlers/invoices.rs

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        db_utils::get_rls_connection,
        error::{ApiError, AppError},
        response::ApiResponse,
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermSalesRead, PermSalesWrite, RequirePermission},
        tenancy::TenantContext,
    },
    models::billing::{CreateInvoicePayload, Invoice, InvoiceDetail, InvoiceListQuery, MarkInvoicePaidPayload},
};

// POST /api/admin/orders/{id}/invoices
#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/invoices",
    tag = "Invoices",
    request_body = CreateInvoicePayload,
    responses(
        (status = 201, description = "Invoice created", body = InvoiceDetail),
        (status = 409, description = "Nothing left to invoice or order closed"),
        (status = 422, description = "Quantity above what is invoiceable")
    ),
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesWrite>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<CreateInvoicePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let invoice = app_state
        .invoice_service
        .create_invoice(&mut *rls_conn, tenant.0, order_id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state.i18n_store.translate(
        &locale.0,
        "message.invoice_created",
        &[("number", invoice.header.invoice_number.clone())],
    );
    Ok(ApiResponse::created(invoice).with_message(message))
}

// GET /api/admin/invoices
#[utoipa::path(
    get,
    path = "/api/admin/invoices",
    tag = "Invoices",
    responses((status = 200, description = "Paginated invoice grid", body = [Invoice])),
    params(InvoiceListQuery, ("x-tenant-id" = Uuid, Header, description = "Store id")),
    security(("api_jwt" = []))
)]
pub async fn list_invoices(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRead>,
    Query(query): Query<InvoiceListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let page = app_state
        .invoice_service
        .list_invoices(&mut *rls_conn, tenant.0, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(page))
}

// GET /api/admin/invoices/{id}
#[utoipa::path(
    get,
    path = "/api/admin/invoices/{id}",
    tag = "Invoices",
    responses(
        (status = 200, description = "Invoice with its lines", body = InvoiceDetail),
        (status = 404, description = "Invoice not found")
    ),
    params(
        ("id" = Uuid, Path, description = "Invoice id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRead>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let invoice = app_state
        .invoice_service
        .get_invoice(&mut *rls_conn, tenant.0, invoice_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(invoice))
}

// POST /api/admin/invoices/{id}/pay
#[utoipa::path(
    post,
    path = "/api/admin/invoices/{id}/pay",
    tag = "Invoices",
    request_body = MarkInvoicePaidPayload,
    responses(
        (status = 200, description = "Invoice paid, capture recorded", body = InvoiceDetail),
        (status = 409, description = "Invoice is not pending")
    ),
    params(
        ("id" = Uuid, Path, description = "Invoice id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn mark_invoice_paid(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesWrite>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<MarkInvoicePaidPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let invoice = app_state
        .invoice_service
        .mark_paid(&mut *rls_conn, tenant.0, invoice_id, payload.gateway_reference.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state.i18n_store.translate(
        &locale.0,
        "message.invoice_paid",
        &[("number", invoice.header.invoice_number.clone())],
    );
    Ok(ApiResponse::ok(invoice).with_message(message))
}

// POST /api/admin/invoices/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/admin/invoices/{id}/cancel",
    tag = "Invoices",
    responses(
        (status = 200, description = "Invoice cancelled, quantities given back", body = InvoiceDetail),
        (status = 409, description = "A paid invoice cannot be cancelled")
    ),
    params(
        ("id" = Uuid, Path, description = "Invoice id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesWrite>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let invoice = app_state
        .invoice_service
        .cancel_invoice(&mut *rls_conn, tenant.0, invoice_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(invoice))
}
