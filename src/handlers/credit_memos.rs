// src/handlers/credit_memos.rs

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
        rbac::{PermSalesRead, PermSalesRefund, RequirePermission},
        tenancy::TenantContext,
    },
    models::{
        billing::{CreateCreditMemoPayload, CreditMemo, CreditMemoDetail, CreditMemoListQuery, RefundPreview},
        sales::CreditMemoStatus,
    },
};

// GET /api/admin/orders/{id}/refund-preview
#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}/refund-preview",
    tag = "Credit Memos",
    responses((status = 200, description = "Refundable quantities and maximum refundable amount", body = RefundPreview)),
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn refund_preview(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRead>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let preview = app_state
        .credit_memo_service
        .refund_preview(&mut *rls_conn, tenant.0, order_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(preview))
}

// POST /api/admin/orders/{id}/credit-memos
#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/credit-memos",
    tag = "Credit Memos",
    request_body = CreateCreditMemoPayload,
    responses(
        (status = 201, description = "Credit memo created (and refunded unless refundNow is false)", body = CreditMemoDetail),
        (status = 409, description = "Refund exceeds the maximum refundable amount"),
        (status = 422, description = "Quantity above what is refundable")
    ),
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_credit_memo(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRefund>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<CreateCreditMemoPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let memo = app_state
        .credit_memo_service
        .create_credit_memo(&mut *rls_conn, tenant.0, order_id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    if memo.header.status != CreditMemoStatus::Refunded {
        return Ok(ApiResponse::created(memo));
    }
    let message = app_state.i18n_store.translate(
        &locale.0,
        "message.refund_issued",
        &[("number", memo.header.credit_memo_number.clone())],
    );
    Ok(ApiResponse::created(memo).with_message(message))
}

// GET /api/admin/credit-memos
#[utoipa::path(
    get,
    path = "/api/admin/credit-memos",
    tag = "Credit Memos",
    responses((status = 200, description = "Paginated credit memo grid", body = [CreditMemo])),
    params(CreditMemoListQuery, ("x-tenant-id" = Uuid, Header, description = "Store id")),
    security(("api_jwt" = []))
)]
pub async fn list_credit_memos(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRead>,
    Query(query): Query<CreditMemoListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let page = app_state
        .credit_memo_service
        .list_credit_memos(&mut *rls_conn, tenant.0, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(page))
}

// GET /api/admin/credit-memos/{id}
#[utoipa::path(
    get,
    path = "/api/admin/credit-memos/{id}",
    tag = "Credit Memos",
    responses(
        (status = 200, description = "Credit memo with its lines", body = CreditMemoDetail),
        (status = 404, description = "Credit memo not found")
    ),
    params(
        ("id" = Uuid, Path, description = "Credit memo id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_credit_memo(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRead>,
    Path(memo_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let memo = app_state
        .credit_memo_service
        .get_credit_memo(&mut *rls_conn, tenant.0, memo_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(memo))
}

// POST /api/admin/credit-memos/{id}/refund
#[utoipa::path(
    post,
    path = "/api/admin/credit-memos/{id}/refund",
    tag = "Credit Memos",
    responses(
        (status = 200, description = "Refund issued", body = CreditMemoDetail),
        (status = 409, description = "Credit memo is not open")
    ),
    params(
        ("id" = Uuid, Path, description = "Credit memo id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn refund_credit_memo(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRefund>,
    Path(memo_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let memo = app_state
        .credit_memo_service
        .refund_credit_memo(&mut *rls_conn, tenant.0, memo_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state.i18n_store.translate(
        &locale.0,
        "message.refund_issued",
        &[("number", memo.header.credit_memo_number.clone())],
    );
    Ok(ApiResponse::ok(memo).with_message(message))
}

// POST /api/admin/credit-memos/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/admin/credit-memos/{id}/cancel",
    tag = "Credit Memos",
    responses(
        (status = 200, description = "Credit memo cancelled", body = CreditMemoDetail),
        (status = 409, description = "Credit memo is not open")
    ),
    params(
        ("id" = Uuid, Path, description = "Credit memo id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_credit_memo(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRefund>,
    Path(memo_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let memo = app_state
        .credit_memo_service
        .cancel_credit_memo(&mut *rls_conn, tenant.0, memo_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(memo))
}
