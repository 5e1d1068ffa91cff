pub mod audit_service;
pub mod auth;
pub mod counterparty_service;
pub mod dashboard_service;
pub mod inventory_service;

pub use audit_service::AuditService;
pub use auth::AuthService;
pub use counterparty_service::CounterpartyService;
pub use dashboard_service::DashboardService;
pub use inventory_service::InventoryService;
