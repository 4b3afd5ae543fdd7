// src/db/customer_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::customer::{Address, AddressInput, Customer, UpdateProfilePayload},
};

const ADDRESS_COLUMNS: &str = "id, tenant_id, customer_id, name, line1, line2, city, state, \
     postal_code, country, phone, is_default, created_at, updated_at";

#[derive(Clone, Default)]
pub struct CustomerRepository;

impl CustomerRepository {
    pub fn new() -> Self {
        Self
    }

    /// Returns the profile of the user in this store, creating it on first use.
    pub async fn upsert_for_user<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        first_name: Option<&str>,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // The no-op update makes RETURNING yield the existing row as well.
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (tenant_id, user_id, first_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, user_id) DO UPDATE SET tenant_id = EXCLUDED.tenant_id
            RETURNING id, tenant_id, user_id, first_name, last_name, phone, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(first_name)
        .fetch_one(executor)
        .await?;
        Ok(customer)
    }

    pub async fn update_profile<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        input: &UpdateProfilePayload,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers SET
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                phone = COALESCE($5, phone),
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING id, tenant_id, user_id, first_name, last_name, phone, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .fetch_one(executor)
        .await?;
        Ok(customer)
    }

    // --- ADDRESSES ---

    pub async fn list_addresses<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Vec<Address>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE tenant_id = $1 AND customer_id = $2 \
             ORDER BY is_default DESC, created_at"
        );
        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(tenant_id)
            .bind(customer_id)
            .fetch_all(executor)
            .await?;
        Ok(addresses)
    }

    pub async fn find_address<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<Option<Address>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE tenant_id = $1 AND customer_id = $2 AND id = $3"
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(tenant_id)
            .bind(customer_id)
            .bind(address_id)
            .fetch_optional(executor)
            .await?;
        Ok(address)
    }

    pub async fn count_addresses<'e, E>(&self, executor: E, tenant_id: Uuid, customer_id: Uuid) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM addresses WHERE tenant_id = $1 AND customer_id = $2")
                .bind(tenant_id)
                .bind(customer_id)
                .fetch_one(executor)
                .await?;
        Ok(total)
    }

    pub async fn clear_default<'e, E>(&self, executor: E, tenant_id: Uuid, customer_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE addresses SET is_default = FALSE WHERE tenant_id = $1 AND customer_id = $2 AND is_default",
        )
        .bind(tenant_id)
        .bind(customer_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn insert_address<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        input: &AddressInput,
        is_default: bool,
    ) -> Result<Address, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO addresses (
                tenant_id, customer_id, name, line1, line2, city, state, postal_code, country, phone, is_default
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, upper($9), $10, $11)
            RETURNING {ADDRESS_COLUMNS}
            "#
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(tenant_id)
            .bind(customer_id)
            .bind(&input.name)
            .bind(&input.line1)
            .bind(&input.line2)
            .bind(&input.city)
            .bind(&input.state)
            .bind(&input.postal_code)
            .bind(&input.country)
            .bind(&input.phone)
            .bind(is_default)
            .fetch_one(executor)
            .await?;
        Ok(address)
    }

    pub async fn update_address<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        address_id: Uuid,
        input: &AddressInput,
        is_default: bool,
    ) -> Result<Option<Address>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE addresses SET
                name = $4, line1 = $5, line2 = $6, city = $7, state = $8,
                postal_code = $9, country = upper($10), phone = $11, is_default = $12,
                updated_at = NOW()
            WHERE tenant_id = $1 AND customer_id = $2 AND id = $3
            RETURNING {ADDRESS_COLUMNS}
            "#
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(tenant_id)
            .bind(customer_id)
            .bind(address_id)
            .bind(&input.name)
            .bind(&input.line1)
            .bind(&input.line2)
            .bind(&input.city)
            .bind(&input.state)
            .bind(&input.postal_code)
            .bind(&input.country)
            .bind(&input.phone)
            .bind(is_default)
            .fetch_optional(executor)
            .await?;
        Ok(address)
    }

    /// Deletes the address and returns whether it was the default one.
    pub async fn delete_address<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<Option<bool>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let was_default: Option<bool> = sqlx::query_scalar(
            "DELETE FROM addresses WHERE tenant_id = $1 AND customer_id = $2 AND id = $3 RETURNING is_default",
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(address_id)
        .fetch_optional(executor)
        .await?;
        Ok(was_default)
    }

    /// Promotes the oldest remaining address after the default one was removed.
    pub async fn promote_oldest_address<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE addresses SET is_default = TRUE, updated_at = NOW()
            WHERE id = (
                SELECT id FROM addresses
                WHERE tenant_id = $1 AND customer_id = $2
                ORDER BY created_at
                LIMIT 1
            )
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .execute(executor)
        .await?;
        Ok(())
    }
}
