// src/models/dashboard.rs

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::inventory::MovementKind;

/// Totais de um dia (data-calendário em UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotals {
    pub day: NaiveDate,
    // Soma das quantidades
    pub entries: i64,
    pub exits: i64,
    // Número de movimentações
    pub entry_movements: i64,
    pub exit_movements: i64,
}

impl DailyTotals {
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            entries: 0,
            exits: 0,
            entry_movements: 0,
            exit_movements: 0,
        }
    }

    fn add(&mut self, kind: MovementKind, movements: i64, quantity: i64) {
        match kind {
            MovementKind::Entry => {
                self.entries += quantity;
                self.entry_movements += movements;
            }
            MovementKind::Exit => {
                self.exits += quantity;
                self.exit_movements += movements;
            }
        }
    }
}

/// Agrupa linhas `(dia, tipo, nº de movimentações, quantidade)` por dia, em ordem crescente.
/// Só aparecem dias que tiveram movimento.
pub fn fold_daily(rows: impl IntoIterator<Item = (NaiveDate, MovementKind, i64, i64)>) -> Vec<DailyTotals> {
    let mut days: BTreeMap<NaiveDate, DailyTotals> = BTreeMap::new();
    for (day, kind, movements, quantity) in rows {
        days.entry(day)
            .or_insert_with(|| DailyTotals::empty(day))
            .add(kind, movements, quantity);
    }
    days.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LowStockItem {
    pub id: Uuid,
    pub name: String,
    pub stock: i32,
    pub min_stock: i32,
}

// Alertas mostrados no painel (os mais críticos primeiro)
pub const LOW_STOCK_ALERTS: usize = 10;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_products: i64,
    // Valor do estoque a preço de compra e a preço de venda
    pub stock_value_purchase: Decimal,
    pub stock_value_sale: Decimal,
    pub today: DailyTotals,
    pub low_stock_count: i64,
    pub low_stock: Vec<LowStockItem>,
}
