pub mod user_repo;
pub use user_repo::UserRepository;
pub mod tenancy_repo;
pub use tenancy_repo::TenantRepository;
pub mod rbac_repo;
pub use rbac_repo::RbacRepository;
pub mod settings_repo;
pub use settings_repo::SettingsRepository;

pub mod catalog_repo;
pub use catalog_repo::{CatalogRepository, ProductFilter};
pub mod customer_repo;
pub use customer_repo::CustomerRepository;
pub mod cart_repo;
pub use cart_repo::CartRepository;

pub mod order_repo;
pub use order_repo::{NewOrder, NewOrderItem, OrderRepository};
pub mod invoice_repo;
pub use invoice_repo::InvoiceRepository;
pub mod shipment_repo;
pub use shipment_repo::ShipmentRepository;
pub mod credit_memo_repo;
pub use credit_memo_repo::{CreditMemoRepository, NewCreditMemo, OpenMemoTotals};
pub mod transaction_repo;
pub use transaction_repo::{NewTransaction, TransactionFilter, TransactionRepository};
