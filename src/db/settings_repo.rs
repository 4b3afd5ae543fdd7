// src/db/settings_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::settings::{TenantSettings, UpdateSettingsRequest},
};

const SETTINGS_COLUMNS: &str = "tenant_id, company_name, tax_id, address, email, phone, currency, \
     tax_rate, flat_shipping_rate, free_shipping_threshold, upi_id, updated_at";

#[derive(Clone, Default)]
pub struct SettingsRepository;

impl SettingsRepository {
    pub fn new() -> Self {
        Self
    }

    /// Stores that never saved settings get the defaults.
    pub async fn get_settings<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<TenantSettings, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {SETTINGS_COLUMNS} FROM tenant_settings WHERE tenant_id = $1");
        let settings = sqlx::query_as::<_, TenantSettings>(&sql)
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;

        Ok(settings.unwrap_or_else(|| TenantSettings::defaults(tenant_id)))
    }

    pub async fn upsert_settings<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        input: &UpdateSettingsRequest,
    ) -> Result<TenantSettings, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO tenant_settings (
                tenant_id, company_name, tax_id, address, email, phone, currency,
                tax_rate, flat_shipping_rate, free_shipping_threshold, upi_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, upper($7), $8, $9, $10, $11)
            ON CONFLICT (tenant_id) DO UPDATE SET
                company_name = EXCLUDED.company_name,
                tax_id = EXCLUDED.tax_id,
                address = EXCLUDED.address,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                currency = EXCLUDED.currency,
                tax_rate = EXCLUDED.tax_rate,
                flat_shipping_rate = EXCLUDED.flat_shipping_rate,
                free_shipping_threshold = EXCLUDED.free_shipping_threshold,
                upi_id = EXCLUDED.upi_id,
                updated_at = NOW()
            RETURNING {SETTINGS_COLUMNS}
            "#
        );

        let settings = sqlx::query_as::<_, TenantSettings>(&sql)
            .bind(tenant_id)
            .bind(&input.company_name)
            .bind(&input.tax_id)
            .bind(&input.address)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.currency)
            .bind(input.tax_rate)
            .bind(input.flat_shipping_rate)
            .bind(input.free_shipping_threshold)
            .bind(&input.upi_id)
            .fetch_one(executor)
            .await?;

        Ok(settings)
    }
}
