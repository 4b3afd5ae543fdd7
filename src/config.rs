// src/config.rs

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, str::FromStr, sync::Arc, time::Duration};

use crate::{
    common::i18n::I18nStore,
    db::{
        CartRepository, CatalogRepository, CreditMemoRepository, CustomerRepository, InvoiceRepository,
        OrderRepository, RbacRepository, SettingsRepository, ShipmentRepository, TenantRepository,
        TransactionRepository, UserRepository,
    },
    services::{
        auth::AuthService, cart_service::CartService, catalog_service::CatalogService,
        checkout_service::CheckoutService, credit_memo_service::CreditMemoService,
        customer_service::CustomerService, document_service::DocumentService, invoice_service::InvoiceService,
        order_service::OrderService, rbac_service::RbacService, shipment_service::ShipmentService,
        tenancy_service::TenantService, transaction_service::TransactionService,
        wishlist_service::WishlistService,
    },
};

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout: Duration,
    pub jwt_ttl_days: i64,
    pub font_dir: String,
    pub font_family: String,
}

fn var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("invalid value for {name}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            server_addr: var_or("SERVER_ADDR", "0.0.0.0:3000".to_string())?,
            database_max_connections: var_or("DATABASE_MAX_CONNECTIONS", 5)?,
            database_acquire_timeout: Duration::from_secs(var_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 3)?),
            jwt_ttl_days: var_or("JWT_TTL_DAYS", 7)?,
            font_dir: var_or("FONT_DIR", "./fonts".to_string())?,
            font_family: var_or("FONT_FAMILY", "Roboto".to_string())?,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub i18n_store: Arc<I18nStore>,

    // Repositories used directly by guards and thin handlers
    pub tenant_repo: TenantRepository,
    pub rbac_repo: RbacRepository,
    pub settings_repo: SettingsRepository,

    pub auth_service: AuthService,
    pub tenant_service: TenantService,
    pub rbac_service: RbacService,
    pub catalog_service: CatalogService,
    pub cart_service: CartService,
    pub wishlist_service: WishlistService,
    pub customer_service: CustomerService,
    pub checkout_service: CheckoutService,
    pub order_service: OrderService,
    pub invoice_service: InvoiceService,
    pub shipment_service: ShipmentService,
    pub credit_memo_service: CreditMemoService,
    pub transaction_service: TransactionService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(config.database_acquire_timeout)
            .connect(&config.database_url)
            .await
            .context("failed to connect to the database")?;

        tracing::info!(max_connections = config.database_max_connections, "database connection established");

        Self::with_pool(config, db_pool)
    }

    /// Wires the dependency graph on top of an existing pool.
    pub fn with_pool(config: Config, db_pool: PgPool) -> anyhow::Result<Self> {
        let i18n_store = Arc::new(I18nStore::load()?);

        let user_repo = UserRepository::new(db_pool.clone());
        let tenant_repo = TenantRepository::new(db_pool.clone());
        let rbac_repo = RbacRepository::new(db_pool.clone());
        let settings_repo = SettingsRepository::new();
        let catalog_repo = CatalogRepository::new();
        let customer_repo = CustomerRepository::new();
        let cart_repo = CartRepository::new();
        let order_repo = OrderRepository::new();
        let invoice_repo = InvoiceRepository::new();
        let shipment_repo = ShipmentRepository::new();
        let credit_memo_repo = CreditMemoRepository::new();
        let transaction_repo = TransactionRepository::new();

        let documents = DocumentService::new(config.font_dir.clone(), config.font_family.clone());

        Ok(Self {
            auth_service: AuthService::new(user_repo, config.jwt_secret.clone(), config.jwt_ttl_days, db_pool.clone()),
            tenant_service: TenantService::new(tenant_repo.clone(), rbac_repo.clone(), db_pool.clone()),
            rbac_service: RbacService::new(rbac_repo.clone(), db_pool.clone()),
            catalog_service: CatalogService::new(catalog_repo.clone()),
            cart_service: CartService::new(cart_repo.clone(), catalog_repo.clone(), settings_repo.clone()),
            wishlist_service: WishlistService::new(cart_repo.clone(), catalog_repo.clone()),
            customer_service: CustomerService::new(customer_repo.clone()),
            checkout_service: CheckoutService::new(
                cart_repo,
                catalog_repo.clone(),
                customer_repo,
                order_repo.clone(),
                settings_repo.clone(),
                transaction_repo.clone(),
            ),
            order_service: OrderService::new(
                order_repo.clone(),
                catalog_repo.clone(),
                invoice_repo.clone(),
                shipment_repo.clone(),
                credit_memo_repo.clone(),
                transaction_repo.clone(),
            ),
            invoice_service: InvoiceService::new(
                invoice_repo.clone(),
                order_repo.clone(),
                transaction_repo.clone(),
                settings_repo.clone(),
                documents.clone(),
            ),
            shipment_service: ShipmentService::new(shipment_repo, order_repo.clone(), catalog_repo.clone()),
            credit_memo_service: CreditMemoService::new(
                credit_memo_repo,
                order_repo.clone(),
                invoice_repo,
                catalog_repo,
                transaction_repo.clone(),
                settings_repo.clone(),
                documents,
            ),
            transaction_service: TransactionService::new(transaction_repo, order_repo),
            tenant_repo,
            rbac_repo,
            settings_repo,
            i18n_store,
            config: Arc::new(config),
            db_pool,
        })
    }
}
