// src/models/counterparty.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::inventory::MovementKind;

// --- Parceiros: fornecedores e clientes ---
// Mesma tabela, separados por `kind`. Exclusão é lógica (`active = false`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "counterparty_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CounterpartyKind {
    Supplier,
    Client,
}

impl CounterpartyKind {
    /// Entrada vem de um fornecedor; saída vai para um cliente.
    pub fn for_movement(kind: MovementKind) -> Self {
        match kind {
            MovementKind::Entry => CounterpartyKind::Supplier,
            MovementKind::Exit => CounterpartyKind::Client,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CounterpartyKind::Supplier => "supplier",
            CounterpartyKind::Client => "client",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CounterpartyKind::Supplier => "Supplier",
            CounterpartyKind::Client => "Client",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Counterparty {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub kind: CounterpartyKind,
    #[schema(example = "Moulins du Sahel")]
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCounterparty {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CounterpartyPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CounterpartyFilter {
    // Nome, telefone ou e-mail
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl CounterpartyFilter {
    pub fn matches(&self, counterparty: &Counterparty) -> bool {
        let Some(needle) = self.search.as_deref().filter(|s| !s.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();
        let hit = |field: Option<&str>| field.is_some_and(|v| v.to_lowercase().contains(&needle));
        hit(Some(&counterparty.name)) || hit(counterparty.phone.as_deref()) || hit(counterparty.email.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplier(name: &str, phone: Option<&str>) -> Counterparty {
        let now = Utc::now();
        Counterparty {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            kind: CounterpartyKind::Supplier,
            name: name.into(),
            phone: phone.map(Into::into),
            email: None,
            address: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn movement_kind_decides_the_partner_kind() {
        assert_eq!(CounterpartyKind::for_movement(MovementKind::Entry), CounterpartyKind::Supplier);
        assert_eq!(CounterpartyKind::for_movement(MovementKind::Exit), CounterpartyKind::Client);
    }

    #[test]
    fn search_looks_at_name_and_phone_ignoring_case() {
        let row = supplier("Moulins du Sahel", Some("+221 77 000 11 22"));
        let by = |s: &str| CounterpartyFilter { search: Some(s.into()), ..Default::default() };
        assert!(by("moulins").matches(&row));
        assert!(by("77 000").matches(&row));
        assert!(!by("dakar").matches(&row));
        assert!(CounterpartyFilter::default().matches(&row));
    }
}
