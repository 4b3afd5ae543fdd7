// src/services/customer_service.rs

use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::CustomerRepository,
    models::{
        auth::User,
        customer::{Address, Customer, CustomerProfile, SaveAddressPayload, UpdateProfilePayload},
    },
};

#[derive(Clone)]
pub struct CustomerService {
    repo: CustomerRepository,
}

impl CustomerService {
    pub fn new(repo: CustomerRepository) -> Self {
        Self { repo }
    }

    /// The store-scoped customer row of a user. Created on first use, named after the account.
    pub async fn resolve_customer<'e, E>(&self, executor: E, tenant_id: Uuid, user: &User) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let first_name = user
            .full_name
            .as_deref()
            .and_then(|n| n.split_whitespace().next());
        self.repo.upsert_for_user(executor, tenant_id, user.id, first_name).await
    }

    pub async fn get_or_create_profile<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user: &User,
    ) -> Result<CustomerProfile, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;

        let customer = self.resolve_customer(&mut *conn, tenant_id, user).await?;
        let addresses = self.repo.list_addresses(&mut *conn, tenant_id, customer.id).await?;

        Ok(CustomerProfile {
            customer,
            email: user.email.clone(),
            addresses,
        })
    }

    pub async fn update_profile<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user: &User,
        payload: &UpdateProfilePayload,
    ) -> Result<CustomerProfile, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut sqlx::PgConnection>,
    {
        let mut conn = executor.acquire().await?;

        let customer = self.resolve_customer(&mut *conn, tenant_id, user).await?;
        let customer = self.repo.update_profile(&mut *conn, tenant_id, customer.id, payload).await?;
        let addresses = self.repo.list_addresses(&mut *conn, tenant_id, customer.id).await?;

        Ok(CustomerProfile {
            customer,
            email: user.email.clone(),
            addresses,
        })
    }

    pub async fn list_addresses<'e, E>(&self, executor: E, tenant_id: Uuid, customer_id: Uuid) -> Result<Vec<Address>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_addresses(executor, tenant_id, customer_id).await
    }

    /// The first address is always the default. A new default demotes the previous one.
    pub async fn add_address<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        payload: &SaveAddressPayload,
    ) -> Result<Address, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let is_first = self.repo.count_addresses(&mut *tx, tenant_id, customer_id).await? == 0;
        let is_default = payload.is_default || is_first;
        if is_default {
            self.repo.clear_default(&mut *tx, tenant_id, customer_id).await?;
        }

        let address = self
            .repo
            .insert_address(&mut *tx, tenant_id, customer_id, &payload.address, is_default)
            .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Un-flagging the default address is ignored: a customer with addresses always has one default.
    pub async fn update_address<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        address_id: Uuid,
        payload: &SaveAddressPayload,
    ) -> Result<Address, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let existing = self
            .repo
            .find_address(&mut *tx, tenant_id, customer_id, address_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Address".into()))?;

        let is_default = payload.is_default || existing.is_default;
        if is_default && !existing.is_default {
            self.repo.clear_default(&mut *tx, tenant_id, customer_id).await?;
        }

        let address = self
            .repo
            .update_address(&mut *tx, tenant_id, customer_id, address_id, &payload.address, is_default)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Address".into()))?;

        tx.commit().await?;
        Ok(address)
    }

    pub async fn delete_address<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let was_default = self
            .repo
            .delete_address(&mut *tx, tenant_id, customer_id, address_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Address".into()))?;

        if was_default {
            self.repo.promote_oldest_address(&mut *tx, tenant_id, customer_id).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
