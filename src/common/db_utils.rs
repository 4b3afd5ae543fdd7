// src/common/db_utils.rs

use sqlx::{pool::PoolConnection, Postgres};

use crate::common::error::AppError;
use crate::config::AppState;
use crate::middleware::auth::AuthenticatedUser;
use crate::middleware::tenancy::TenantContext;

// ---
// RLS helpers: every tenant-scoped request works on a connection that carries
// `app.tenant_id` (and `app.user_id` when authenticated) for the row policies.
// ---

/// Acquires a pooled connection scoped to the tenant and the authenticated user.
pub(crate) async fn get_rls_connection(
    app_state: &AppState,
    tenant_ctx: &TenantContext,
    user: &AuthenticatedUser,
) -> Result<PoolConnection<Postgres>, AppError> {
    let mut conn = get_tenant_connection(app_state, tenant_ctx).await?;

    sqlx::query("SELECT set_config('app.user_id', $1, false)")
        .bind(user.0.id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(conn)
}

/// Acquires a pooled connection scoped to the tenant only (public storefront reads).
pub(crate) async fn get_tenant_connection(
    app_state: &AppState,
    tenant_ctx: &TenantContext,
) -> Result<PoolConnection<Postgres>, AppError> {
    let mut conn = app_state.db_pool.acquire().await?;

    // Session-level so the value survives the transactions the services open.
    // Connections are re-scoped on every acquire, and user_id is cleared for anonymous use.
    sqlx::query("SELECT set_config('app.tenant_id', $1, false), set_config('app.user_id', '', false)")
        .bind(tenant_ctx.0.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(conn)
}

/// Maps a unique-constraint violation to a 409 naming the duplicated value, passes
/// other errors through.
pub(crate) fn map_unique_violation(e: sqlx::Error, value: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation(value.to_string());
        }
    }
    e.into()
}
