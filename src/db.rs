pub mod store;
pub use store::{AuditStore, CounterpartyStore, DashboardStore, InventoryStore, InventoryTx, UserStore};
pub mod user_repo;
pub use user_repo::UserRepository;
pub mod inventory_repo;
pub use inventory_repo::InventoryRepository;
pub mod counterparty_repo;
pub use counterparty_repo::CounterpartyRepository;
pub mod dashboard_repo;
pub use dashboard_repo::DashboardRepository;
pub mod audit_repo;
pub use audit_repo::AuditRepository;
pub mod memory_repo;
pub use memory_repo::{FailPoint, MemoryAuditStore, MemoryInventoryStore, MemoryUserStore};
