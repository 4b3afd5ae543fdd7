// src/handlers/orders.rs

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
    models::{
        billing::{RecordFailedPaymentPayload, RecordPaymentPayload, Transaction, TransactionListQuery},
        sales::{CancelOrderPayload, Order, OrderDetail, OrderListQuery, UpdateOrderStatusPayload},
    },
};

// =============================================================================
//  ORDERS
// =============================================================================

// GET /api/admin/orders
#[utoipa::path(
    get,
    path = "/api/admin/orders",
    tag = "Sales",
    responses((status = 200, description = "Paginated order grid", body = [Order])),
    params(OrderListQuery, ("x-tenant-id" = Uuid, Header, description = "Store id")),
    security(("api_jwt" = []))
)]
pub async fn list_orders(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRead>,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let page = app_state
        .order_service
        .list_orders(&mut *rls_conn, tenant.0, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(page))
}

// GET /api/admin/orders/{id}
#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    tag = "Sales",
    responses(
        (status = 200, description = "Order with items and every sales document", body = OrderDetail),
        (status = 404, description = "Order not found")
    ),
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_order(
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

    let detail = app_state
        .order_service
        .get_order_detail(&mut *rls_conn, tenant.0, order_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(detail))
}

// PATCH /api/admin/orders/{id}/status
#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    tag = "Sales",
    request_body = UpdateOrderStatusPayload,
    responses(
        (status = 200, description = "Status changed", body = Order),
        (status = 409, description = "Transition not allowed")
    ),
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_order_status(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesWrite>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let order = app_state
        .order_service
        .update_status(&mut *rls_conn, tenant.0, order_id, payload.status, payload.notes.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(order))
}

// POST /api/admin/orders/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/cancel",
    tag = "Sales",
    request_body = CancelOrderPayload,
    responses(
        (status = 200, description = "Order cancelled, reservations released", body = Order),
        (status = 409, description = "Order has payments or shipped units")
    ),
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_order(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesWrite>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<CancelOrderPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let order = app_state
        .order_service
        .cancel_order(&mut *rls_conn, tenant.0, order_id, payload.reason.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state.i18n_store.translate(
        &locale.0,
        "message.order_cancelled",
        &[("order", order.order_number.clone())],
    );
    Ok(ApiResponse::ok(order).with_message(message))
}

// =============================================================================
//  TRANSACTIONS
// =============================================================================

// POST /api/admin/orders/{id}/payments
#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/payments",
    tag = "Sales",
    request_body = RecordPaymentPayload,
    responses(
        (status = 201, description = "Capture recorded", body = Transaction),
        (status = 409, description = "Amount exceeds the outstanding balance")
    ),
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn record_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesWrite>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<RecordPaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let transaction = app_state
        .transaction_service
        .record_payment(&mut *rls_conn, tenant.0, order_id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::created(transaction))
}

// POST /api/admin/orders/{id}/payments/failed
#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/payments/failed",
    tag = "Sales",
    request_body = RecordFailedPaymentPayload,
    responses((status = 201, description = "Failed payment recorded", body = Transaction)),
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn record_failed_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesWrite>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<RecordFailedPaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let transaction = app_state
        .transaction_service
        .record_failed_payment(&mut *rls_conn, tenant.0, order_id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::created(transaction))
}

// GET /api/admin/orders/{id}/transactions
#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}/transactions",
    tag = "Sales",
    responses((status = 200, description = "Payment history of the order", body = [Transaction])),
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_order_transactions(
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

    let transactions = app_state
        .transaction_service
        .list_for_order(&mut *rls_conn, tenant.0, order_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(transactions))
}

// GET /api/admin/transactions
#[utoipa::path(
    get,
    path = "/api/admin/transactions",
    tag = "Sales",
    responses((status = 200, description = "Paginated transaction grid", body = [Transaction])),
    params(TransactionListQuery, ("x-tenant-id" = Uuid, Header, description = "Store id")),
    security(("api_jwt" = []))
)]
pub async fn list_transactions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRead>,
    Query(query): Query<TransactionListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let page = app_state
        .transaction_service
        .list_transactions(&mut *rls_conn, tenant.0, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(page))
}
