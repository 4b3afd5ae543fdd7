// src/handlers/rbac.rs

use axum::{extract::State, response::IntoResponse, Json};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        response::ApiResponse,
    },
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{PermRolesWrite, RequirePermission},
        tenancy::TenantContext,
    },
    models::rbac::{CreateRolePayload, Permission, RoleResponse},
};

// POST /api/admin/roles
#[utoipa::path(
    post,
    path = "/api/admin/roles",
    tag = "RBAC",
    request_body = CreateRolePayload,
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 403, description = "Missing roles:write")
    ),
    params(("x-tenant-id" = Uuid, Header, description = "Store id")),
    security(("api_jwt" = []))
)]
pub async fn create_role(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesWrite>,
    Json(payload): Json<CreateRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let role = app_state
        .rbac_service
        .create_role_with_permissions(tenant.0, &payload.name, payload.description.as_deref(), &payload.permissions)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::created(role))
}

// GET /api/admin/permissions
#[utoipa::path(
    get,
    path = "/api/admin/permissions",
    tag = "RBAC",
    responses((status = 200, description = "Every permission a role can hold", body = [Permission])),
    params(("x-tenant-id" = Uuid, Header, description = "Store id")),
    security(("api_jwt" = []))
)]
pub async fn list_permissions(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let permissions = app_state
        .rbac_service
        .list_system_permissions()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(permissions))
}
