// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeaderRejection,
    TypedHeader,
};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{i18n::Locale, tenancy::TenantContext},
    models::auth::User,
};

type BearerHeader = Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>;

async fn authenticate(app_state: &AppState, bearer: BearerHeader) -> Result<User, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|_| AppError::InvalidToken)?;
    app_state.auth_service.validate_token(bearer.token()).await
}

/// Resolves the bearer token to a user. Used by customer and account routes.
pub async fn auth_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    bearer: BearerHeader,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&app_state, bearer)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Back-office guard: an authenticated user who is an active member of the store
/// named by `X-Tenant-ID`.
pub async fn tenant_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    bearer: BearerHeader,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let user = authenticate(&app_state, bearer).await.map_err(to_api)?;
    let is_member = app_state
        .tenant_repo
        .is_active_member(user.id, tenant.0)
        .await
        .map_err(to_api)?;
    if !is_member {
        tracing::warn!(user_id = %user.id, tenant_id = %tenant.0, "back-office access without membership");
        return Err(to_api(AppError::NotATenantMember));
    }

    request.extensions_mut().insert(tenant);
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// The user resolved by one of the guards.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AppError::InvalidToken)
    }
}
