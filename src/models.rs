pub mod audit;
pub mod auth;
pub mod counterparty;
pub mod dashboard;
pub mod inventory;
