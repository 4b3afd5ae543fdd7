// src/handlers/shipments.rs

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
    models::fulfillment::{
        CreateShipmentPayload, Shipment, ShipmentDetail, ShipmentListQuery, UpdateTrackingPayload,
    },
};

// POST /api/admin/orders/{id}/shipments
#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/shipments",
    tag = "Shipments",
    request_body = CreateShipmentPayload,
    responses(
        (status = 201, description = "Shipment created, stock released", body = ShipmentDetail),
        (status = 409, description = "Nothing left to ship or order closed")
    ),
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_shipment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesWrite>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<CreateShipmentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let shipment = app_state
        .shipment_service
        .create_shipment(&mut *rls_conn, tenant.0, order_id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state.i18n_store.translate(
        &locale.0,
        "message.shipment_created",
        &[("number", shipment.header.shipment_number.clone())],
    );
    Ok(ApiResponse::created(shipment).with_message(message))
}

// GET /api/admin/shipments
#[utoipa::path(
    get,
    path = "/api/admin/shipments",
    tag = "Shipments",
    responses((status = 200, description = "Paginated shipment grid", body = [Shipment])),
    params(ShipmentListQuery, ("x-tenant-id" = Uuid, Header, description = "Store id")),
    security(("api_jwt" = []))
)]
pub async fn list_shipments(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRead>,
    Query(query): Query<ShipmentListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let page = app_state
        .shipment_service
        .list_shipments(&mut *rls_conn, tenant.0, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(page))
}

// GET /api/admin/shipments/{id}
#[utoipa::path(
    get,
    path = "/api/admin/shipments/{id}",
    tag = "Shipments",
    responses(
        (status = 200, description = "Shipment with its lines", body = ShipmentDetail),
        (status = 404, description = "Shipment not found")
    ),
    params(
        ("id" = Uuid, Path, description = "Shipment id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_shipment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesRead>,
    Path(shipment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let shipment = app_state
        .shipment_service
        .get_shipment(&mut *rls_conn, tenant.0, shipment_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(shipment))
}

// PUT /api/admin/shipments/{id}/tracking
#[utoipa::path(
    put,
    path = "/api/admin/shipments/{id}/tracking",
    tag = "Shipments",
    request_body = UpdateTrackingPayload,
    responses(
        (status = 200, description = "Tracking updated", body = ShipmentDetail),
        (status = 409, description = "Shipment is no longer modifiable")
    ),
    params(
        ("id" = Uuid, Path, description = "Shipment id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_tracking(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesWrite>,
    Path(shipment_id): Path<Uuid>,
    Json(payload): Json<UpdateTrackingPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let shipment = app_state
        .shipment_service
        .update_tracking(
            &mut *rls_conn,
            tenant.0,
            shipment_id,
            payload.carrier.as_deref(),
            &payload.tracking_number,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(shipment))
}

// POST /api/admin/shipments/{id}/deliver
#[utoipa::path(
    post,
    path = "/api/admin/shipments/{id}/deliver",
    tag = "Shipments",
    responses((status = 200, description = "Shipment delivered", body = ShipmentDetail)),
    params(
        ("id" = Uuid, Path, description = "Shipment id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn mark_delivered(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesWrite>,
    Path(shipment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let shipment = app_state
        .shipment_service
        .mark_delivered(&mut *rls_conn, tenant.0, shipment_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(shipment))
}

// POST /api/admin/shipments/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/admin/shipments/{id}/cancel",
    tag = "Shipments",
    responses(
        (status = 200, description = "Shipment cancelled, stock returned to the reservation", body = ShipmentDetail),
        (status = 409, description = "Delivered shipments cannot be cancelled")
    ),
    params(
        ("id" = Uuid, Path, description = "Shipment id"),
        ("x-tenant-id" = Uuid, Header, description = "Store id")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_shipment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermSalesWrite>,
    Path(shipment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let shipment = app_state
        .shipment_service
        .cancel_shipment(&mut *rls_conn, tenant.0, shipment_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(shipment))
}
