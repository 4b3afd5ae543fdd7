pub mod auth;
pub mod billing;
pub mod cart;
pub mod catalog;
pub mod customer;
pub mod fulfillment;
pub mod rbac;
pub mod sales;
pub mod settings;
pub mod tenancy;
