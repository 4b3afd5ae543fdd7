// src/services/tenancy_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{RbacRepository, TenantRepository},
    models::tenancy::{MemberTenant, Tenant},
};

pub const OWNER_ROLE: &str = "Owner";

#[derive(Clone)]
pub struct TenantService {
    tenant_repo: TenantRepository,
    rbac_repo: RbacRepository,
    pool: PgPool,
}

impl TenantService {
    pub fn new(tenant_repo: TenantRepository, rbac_repo: RbacRepository, pool: PgPool) -> Self {
        Self { tenant_repo, rbac_repo, pool }
    }

    /// Creates the store and makes its creator the owner, holding every permission.
    pub async fn create_tenant_with_owner(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: Uuid,
    ) -> Result<Tenant, AppError> {
        let mut tx = self.pool.begin().await?;

        let tenant = self.tenant_repo.create_tenant(&mut *tx, name, description).await?;

        let owner_role = self
            .rbac_repo
            .create_role(&mut *tx, tenant.id, OWNER_ROLE, Some("Full access, created with the store"))
            .await?;

        let permission_ids: Vec<Uuid> = self
            .rbac_repo
            .list_all_permissions(&mut *tx)
            .await?
            .iter()
            .map(|p| p.id)
            .collect();

        if !permission_ids.is_empty() {
            self.rbac_repo
                .assign_permissions(&mut *tx, owner_role.id, &permission_ids)
                .await?;
        }

        self.tenant_repo
            .add_member(&mut *tx, tenant.id, owner_id, owner_role.id)
            .await?;

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant.id, owner_id = %owner_id, "tenant created");
        Ok(tenant)
    }

    pub async fn list_user_tenants(&self, user_id: Uuid) -> Result<Vec<MemberTenant>, AppError> {
        self.tenant_repo.list_for_user(user_id).await
    }
}
