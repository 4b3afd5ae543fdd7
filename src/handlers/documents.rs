// src/handlers/documents.rs

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    common::{db_utils::get_rls_connection, error::ApiError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermSalesRead, RequirePermission},
        tenancy::TenantContext,
    },
    services::document_service::RenderedDocument,
};

fn pdf_attachment(document: RenderedDocument) -> Response {
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", document.filename)),
    ];
    (headers, document.bytes).into_response()
}

// GET /api/admin/invoices/{id}/pdf
#[utoipa::path(
    get,
    path = "/api/admin/invoices/{id}/pdf",
    tag = "Invoices",
    responses(
        (status = 200, description = "Invoice PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 500, description = "Fonts missing on the server")
    ),
    params(
        ("id" = Uuid, Path, description = "Invoice id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn invoice_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRead>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let document = app_state
        .invoice_service
        .render_invoice_pdf(&mut *rls_conn, tenant.0, invoice_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(pdf_attachment(document))
}

// GET /api/admin/credit-memos/{id}/pdf
#[utoipa::path(
    get,
    path = "/api/admin/credit-memos/{id}/pdf",
    tag = "Credit Memos",
    responses(
        (status = 200, description = "Credit memo PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 500, description = "Fonts missing on the server")
    ),
    params(
        ("id" = Uuid, Path, description = "Credit memo id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn credit_memo_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRead>,
    Path(memo_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let document = app_state
        .credit_memo_service
        .render_credit_memo_pdf(&mut *rls_conn, tenant.0, memo_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(pdf_attachment(document))
}
