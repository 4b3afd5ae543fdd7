// src/services/rbac_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::RbacRepository,
    models::rbac::{Permission, RoleResponse},
};

#[derive(Clone)]
pub struct RbacService {
    repo: RbacRepository,
    pool: PgPool,
}

impl RbacService {
    pub fn new(repo: RbacRepository, pool: PgPool) -> Self {
        Self { repo, pool }
    }

    /// Unknown slugs are ignored; the response lists the ones actually granted.
    pub async fn create_role_with_permissions(
        &self,
        tenant_id: Uuid,
        name: &str,
        description: Option<&str>,
        permission_slugs: &[String],
    ) -> Result<RoleResponse, AppError> {
        let mut tx = self.pool.begin().await?;

        let role = self.repo.create_role(&mut *tx, tenant_id, name, description).await?;

        let permissions = self.repo.find_permissions_by_slugs(&mut *tx, permission_slugs).await?;
        let permission_ids: Vec<Uuid> = permissions.iter().map(|p| p.id).collect();
        let granted: Vec<String> = permissions.into_iter().map(|p| p.slug).collect();

        if !permission_ids.is_empty() {
            self.repo.assign_permissions(&mut *tx, role.id, &permission_ids).await?;
        }

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant_id, role_id = %role.id, permissions = granted.len(), "role created");
        Ok(RoleResponse { role, permissions: granted })
    }

    pub async fn list_system_permissions(&self) -> Result<Vec<Permission>, AppError> {
        self.repo.list_all_permissions(&self.pool).await
    }
}
