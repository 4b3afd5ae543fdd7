pub mod auth;
pub mod cart_service;
pub mod catalog_service;
pub mod checkout_service;
pub mod credit_memo_service;
pub mod customer_service;
pub mod document_service;
pub mod invoice_service;
pub mod order_service;
pub mod rbac_service;
pub mod shipment_service;
pub mod tenancy_service;
pub mod totals;
pub mod transaction_service;
pub mod wishlist_service;
