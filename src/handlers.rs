pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod credit_memos;
pub mod customer;
pub mod documents;
pub mod invoices;
pub mod orders;
pub mod rbac;
pub mod settings;
pub mod shipments;
pub mod tenancy;
pub mod wishlist;

use sqlx::PgConnection;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, tenancy::TenantContext},
    models::customer::Customer,
};

/// Customer row of the signed-in user in the selected store, created on first use.
pub(crate) async fn current_customer(
    app_state: &AppState,
    conn: &mut PgConnection,
    tenant: &TenantContext,
    user: &AuthenticatedUser,
) -> Result<Customer, AppError> {
    app_state.customer_service.resolve_customer(conn, tenant.0, &user.0).await
}
