// src/models/audit.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::counterparty::CounterpartyKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    StockEntry,
    StockExit,
    MovementReversed,
    ProductCreated,
    ProductUpdated,
    PriceChanged,
    ProductDeleted,
    CounterpartyCreated,
    CounterpartyUpdated,
    CounterpartyDeleted,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::StockEntry => "stock_entry",
            AuditAction::StockExit => "stock_exit",
            AuditAction::MovementReversed => "movement_reversed",
            AuditAction::ProductCreated => "product_created",
            AuditAction::ProductUpdated => "product_updated",
            AuditAction::PriceChanged => "price_changed",
            AuditAction::ProductDeleted => "product_deleted",
            AuditAction::CounterpartyCreated => "counterparty_created",
            AuditAction::CounterpartyUpdated => "counterparty_updated",
            AuditAction::CounterpartyDeleted => "counterparty_deleted",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
// Ações de estoque são registradas contra o produto afetado;
// o cadastro de parceiros, contra o fornecedor ou cliente.
pub enum EntityType {
    Product,
    Supplier,
    Client,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Product => "product",
            EntityType::Supplier => "supplier",
            EntityType::Client => "client",
        }
    }
}

impl From<CounterpartyKind> for EntityType {
    fn from(kind: CounterpartyKind) -> Self {
        match kind {
            CounterpartyKind::Supplier => EntityType::Supplier,
            CounterpartyKind::Client => EntityType::Client,
        }
    }
}

// Evento disparado pelos serviços ("fire-and-forget").
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub description: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

// --- Linha do histórico (tabela audit_log) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "stock_entry")]
    pub action: String,
    #[schema(example = "product")]
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_event(event: &AuditEvent, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: event.tenant_id,
            user_id: event.user_id,
            action: event.action.as_str().to_string(),
            entity_type: event.entity_type.as_str().to_string(),
            entity_id: Some(event.entity_id),
            description: event.description.clone(),
            before: event.before.clone(),
            after: event.after.clone(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub product_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub page: u32,
    pub limit: u32,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        let day = entry.created_at.date_naive();
        self.date_from.is_none_or(|from| day >= from)
            && self.date_to.is_none_or(|to| day <= to)
            && self.product_id.is_none_or(|p| {
                entry.entity_type == EntityType::Product.as_str() && entry.entity_id == Some(p)
            })
            && self.action.is_none_or(|a| entry.action == a.as_str())
    }
}
