// src/models/inventory.rs

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// --- 1. Produto (Catálogo) ---
// O saldo (`stock`) só é alterado pelo motor de movimentações.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "Riz 25kg")]
    pub name: String,
    pub barcode: Option<String>,
    #[schema(example = "sac")]
    pub unit: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    pub stock: i32,
    pub min_stock: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

// Dados de inserção de um produto (o saldo inicial entra como movimentação).
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub barcode: Option<String>,
    pub unit: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    pub min_stock: i32,
}

// Alteração parcial. Nunca toca no saldo.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub barcode: Option<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub purchase_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub min_stock: Option<i32>,
}

impl ProductPatch {
    pub fn changes_price(&self, current: &Product) -> bool {
        self.purchase_price.is_some_and(|p| p != current.purchase_price)
            || self.sale_price.is_some_and(|p| p != current.sale_price)
    }
}

/// Colunas aceitas em `sort`. Lista fechada: o valor vai direto para o ORDER BY.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ProductSort {
    #[default]
    Name,
    PurchasePrice,
    SalePrice,
    Stock,
    CreatedAt,
}

impl ProductSort {
    pub fn column(self) -> &'static str {
        match self {
            ProductSort::Name => "name",
            ProductSort::PurchasePrice => "purchase_price",
            ProductSort::SalePrice => "sale_price",
            ProductSort::Stock => "stock",
            ProductSort::CreatedAt => "created_at",
        }
    }

    pub fn compare(self, a: &Product, b: &Product) -> Ordering {
        match self {
            ProductSort::Name => a.name.cmp(&b.name),
            ProductSort::PurchasePrice => a.purchase_price.cmp(&b.purchase_price),
            ProductSort::SalePrice => a.sale_price.cmp(&b.sale_price),
            ProductSort::Stock => a.stock.cmp(&b.stock),
            ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub low_stock: bool,
    pub category_id: Option<Uuid>,
    pub sort: ProductSort,
    pub direction: SortDirection,
    pub page: u32,
    pub limit: u32,
}

impl ProductFilter {
    /// Ordem da listagem; empates caem no nome e depois no id.
    pub fn ordering(&self, a: &Product, b: &Product) -> Ordering {
        let primary = match self.direction {
            SortDirection::Asc => self.sort.compare(a, b),
            SortDirection::Desc => self.sort.compare(b, a),
        };
        primary.then_with(|| a.name.cmp(&b.name)).then_with(|| a.id.cmp(&b.id))
    }
}

// --- Categorias ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "Céréales")]
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

// --- 2. Movimentações de Estoque ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "movement_kind", rename_all = "lowercase")] // Banco
#[serde(rename_all = "lowercase")] // JSON
pub enum MovementKind {
    Entry, // Vira "entry"
    Exit,  // Vira "exit"
}

impl MovementKind {
    /// Saldo resultante da movimentação. `None` em caso de overflow.
    pub fn apply(self, stock: i32, quantity: Quantity) -> Option<i32> {
        match self {
            MovementKind::Entry => stock.checked_add(quantity.get()),
            MovementKind::Exit => stock.checked_sub(quantity.get()),
        }
    }

    /// Saldo após desfazer a movimentação. Não impede saldo negativo.
    pub fn revert(self, stock: i32, quantity: Quantity) -> Option<i32> {
        match self {
            MovementKind::Entry => stock.checked_sub(quantity.get()),
            MovementKind::Exit => stock.checked_add(quantity.get()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Entry => "entry",
            MovementKind::Exit => "exit",
        }
    }
}

/// Quantidade de uma movimentação: inteiro >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(i32);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, AppError> {
        if value < 1 {
            return Err(AppError::InvalidQuantity);
        }
        i32::try_from(value)
            .map(Quantity)
            .map_err(|_| AppError::InvalidQuantity)
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = AppError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        // 2.5 não é uma quantidade válida, 2.0 é.
        if value.fract() != Decimal::ZERO {
            return Err(AppError::InvalidQuantity);
        }
        let whole = value.trunc().to_i64().ok_or(AppError::InvalidQuantity)?;
        Quantity::new(whole)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub kind: MovementKind,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub moved_at: DateTime<Utc>,
    // Fornecedor (entrada) ou cliente (saída)
    pub counterparty_id: Option<Uuid>,
    pub comment: Option<String>,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn quantity(&self) -> Result<Quantity, AppError> {
        Quantity::new(i64::from(self.quantity))
    }
}

/// Movimentação com os nomes já resolvidos, como as telas de consulta mostram.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub movement: StockMovement,
    #[schema(example = "Riz 25kg")]
    pub product_name: String,
    pub product_unit: String,
    pub user_name: Option<String>,
    // Nome do fornecedor ou do cliente
    pub counterparty_name: Option<String>,
}

// Linha pronta para o INSERT (preço já resolvido).
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub kind: MovementKind,
    pub quantity: Quantity,
    pub unit_price: Decimal,
    pub moved_at: DateTime<Utc>,
    pub counterparty_id: Option<Uuid>,
    pub comment: Option<String>,
    pub reference: Option<String>,
}

// Pedido de movimentação, como chega ao serviço.
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub kind: MovementKind,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub counterparty_id: Option<Uuid>,
    pub moved_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub reference: Option<String>,
}

impl MovementRequest {
    pub fn new(kind: MovementKind, product_id: Uuid, quantity: impl Into<Decimal>) -> Self {
        Self {
            kind,
            product_id,
            quantity: quantity.into(),
            unit_price: None,
            counterparty_id: None,
            moved_at: None,
            comment: None,
            reference: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementReceipt {
    pub movement_id: Uuid,
    pub new_stock: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReversalReceipt {
    pub movement_id: Uuid,
    pub product_id: Uuid,
    pub new_stock: i32,
}

#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
    // Intervalo inclusivo, comparado pela data-calendário em UTC
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: u32,
    pub limit: u32,
}

impl MovementFilter {
    pub fn matches(&self, movement: &StockMovement) -> bool {
        let day = movement.moved_at.date_naive();
        self.product_id.is_none_or(|p| p == movement.product_id)
            && self.kind.is_none_or(|k| k == movement.kind)
            && self.date_from.is_none_or(|from| day >= from)
            && self.date_to.is_none_or(|to| day <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_rejects_zero_negative_and_fractions() {
        assert!(matches!(Quantity::try_from(Decimal::ZERO), Err(AppError::InvalidQuantity)));
        assert!(matches!(Quantity::try_from(Decimal::from(-3)), Err(AppError::InvalidQuantity)));
        assert!(matches!(
            Quantity::try_from(Decimal::new(25, 1)),
            Err(AppError::InvalidQuantity)
        ));
        assert!(matches!(
            Quantity::try_from(Decimal::from(i64::from(i32::MAX) + 1)),
            Err(AppError::InvalidQuantity)
        ));
        assert_eq!(Quantity::try_from(Decimal::new(20, 0)).unwrap().get(), 20);
        assert_eq!(Quantity::try_from(Decimal::new(200, 1)).unwrap().get(), 20);
    }

    #[test]
    fn apply_and_revert_are_inverse() {
        let q = Quantity::new(20).unwrap();
        assert_eq!(MovementKind::Entry.apply(50, q), Some(70));
        assert_eq!(MovementKind::Entry.revert(70, q), Some(50));
        assert_eq!(MovementKind::Exit.apply(50, q), Some(30));
        assert_eq!(MovementKind::Exit.revert(30, q), Some(50));
        // Estorno de entrada não é barrado em zero
        assert_eq!(MovementKind::Entry.revert(5, q), Some(-15));
        assert_eq!(MovementKind::Entry.apply(i32::MAX, q), None);
    }

    fn priced(name: &str, purchase: i64, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            name: name.into(),
            barcode: None,
            unit: "unit".into(),
            description: None,
            category_id: None,
            purchase_price: Decimal::from(purchase),
            sale_price: Decimal::from(purchase * 2),
            stock,
            min_stock: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn product_ordering_follows_sort_and_direction_with_name_tiebreak() {
        let mut rows = vec![priced("Sucre", 10, 3), priced("Huile", 30, 3), priced("Farine", 10, 9)];

        let by_price_desc = ProductFilter {
            sort: ProductSort::PurchasePrice,
            direction: SortDirection::Desc,
            ..Default::default()
        };
        rows.sort_by(|a, b| by_price_desc.ordering(a, b));
        let names: Vec<&str> = rows.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Huile", "Farine", "Sucre"]);

        rows.sort_by(|a, b| ProductFilter::default().ordering(a, b));
        let names: Vec<&str> = rows.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Farine", "Huile", "Sucre"]);
        assert_eq!(ProductSort::Stock.column(), "stock");
    }
}
