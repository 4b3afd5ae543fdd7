// src/middleware/rbac.rs

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::marker::PhantomData;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale, tenancy::TenantContext},
};

pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// Rejects the request unless the user's role in the current store grants `T`.
pub struct RequirePermission<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_headers(&parts.headers, &app_state.i18n_store);
        let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| to_api(AppError::InvalidToken))?;
        let tenant = TenantContext::from_request_parts(parts, state).await?;

        let required = T::slug();
        let allowed = app_state
            .rbac_repo
            .user_has_permission(user.0.id, tenant.0, required)
            .await
            .map_err(to_api)?;

        if !allowed {
            tracing::warn!(user_id = %user.0.id, tenant_id = %tenant.0, permission = required, "permission denied");
            return Err(to_api(AppError::PermissionDenied(required.to_string())));
        }

        Ok(RequirePermission(PhantomData))
    }
}

macro_rules! permission {
    ($name:ident => $slug:literal) => {
        pub struct $name;

        impl PermissionDef for $name {
            fn slug() -> &'static str {
                $slug
            }
        }
    };
}

permission!(PermCatalogWrite => "catalog:write");
permission!(PermSalesRead => "sales:read");
permission!(PermSalesWrite => "sales:write");
permission!(PermSalesRefund => "sales:refund");
permission!(PermSettingsWrite => "settings:write");
permission!(PermRolesWrite => "roles:write");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_match_seeded_permissions() {
        let seeded = include_str!("../../migrations/20250101000000_identity_and_tenancy.sql");
        for slug in [
            PermCatalogWrite::slug(),
            PermSalesRead::slug(),
            PermSalesWrite::slug(),
            PermSalesRefund::slug(),
            PermSettingsWrite::slug(),
            PermRolesWrite::slug(),
        ] {
            assert!(seeded.contains(&format!("'{slug}'")), "{slug} is not seeded");
        }
    }
}
