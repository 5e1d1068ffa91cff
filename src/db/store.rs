// src/db/store.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    common::{error::AppError, pagination::Page},
    models::{
        audit::{AuditEntry, AuditEvent, AuditFilter},
        auth::{Actor, NewTenant, NewUser, Tenant, User},
        counterparty::{
            Counterparty, CounterpartyFilter, CounterpartyKind, CounterpartyPatch, NewCounterparty,
        },
        dashboard::{DailyTotals, DashboardStats},
        inventory::{
            Category, MovementFilter, MovementView, NewCategory, NewMovement, NewProduct, Product,
            ProductFilter, ProductPatch, StockMovement,
        },
    },
};

/// Catálogo + livro-razão de um tenant.
///
/// Leituras avulsas ficam aqui; toda escrita passa por um [`InventoryTx`],
/// obtido com [`InventoryStore::begin`] e liberado no commit ou no drop (rollback).
#[async_trait]
pub trait InventoryStore: Send + Sync + 'static {
    async fn begin(&self, actor: &Actor) -> Result<Box<dyn InventoryTx>, AppError>;

    async fn find_product(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError>;

    async fn list_products(
        &self,
        tenant_id: Uuid,
        filter: &ProductFilter,
    ) -> Result<Page<Product>, AppError>;

    async fn find_movement(
        &self,
        tenant_id: Uuid,
        movement_id: Uuid,
    ) -> Result<Option<MovementView>, AppError>;

    /// Mais recentes primeiro (`moved_at`, depois ordem de criação).
    async fn list_movements(
        &self,
        tenant_id: Uuid,
        filter: &MovementFilter,
    ) -> Result<Page<MovementView>, AppError>;

    /// Ordenadas pelo nome.
    async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<Category>, AppError>;
}

/// Uma transação aberta. Nada fica visível antes de [`InventoryTx::commit`].
#[async_trait]
pub trait InventoryTx: Send {
    /// Lê o produto bloqueando a linha até o fim da transação (ativo ou não).
    async fn lock_product(
        &mut self,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError>;

    /// Insere com saldo 0.
    async fn insert_product(
        &mut self,
        tenant_id: Uuid,
        product: &NewProduct,
    ) -> Result<Product, AppError>;

    async fn update_product(
        &mut self,
        tenant_id: Uuid,
        product_id: Uuid,
        patch: &ProductPatch,
    ) -> Result<Product, AppError>;

    async fn deactivate_product(&mut self, tenant_id: Uuid, product_id: Uuid) -> Result<(), AppError>;

    async fn write_stock(
        &mut self,
        tenant_id: Uuid,
        product_id: Uuid,
        stock: i32,
    ) -> Result<(), AppError>;

    async fn insert_movement(&mut self, movement: &NewMovement) -> Result<StockMovement, AppError>;

    async fn lock_movement(
        &mut self,
        tenant_id: Uuid,
        movement_id: Uuid,
    ) -> Result<Option<StockMovement>, AppError>;

    async fn delete_movement(&mut self, tenant_id: Uuid, movement_id: Uuid) -> Result<(), AppError>;

    /// Lê o parceiro e o protege contra alteração até o commit (ativo ou não).
    async fn find_counterparty(
        &mut self,
        tenant_id: Uuid,
        counterparty_id: Uuid,
    ) -> Result<Option<Counterparty>, AppError>;

    async fn find_category(
        &mut self,
        tenant_id: Uuid,
        category_id: Uuid,
    ) -> Result<Option<Category>, AppError>;

    async fn insert_category(
        &mut self,
        tenant_id: Uuid,
        category: &NewCategory,
    ) -> Result<Category, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

/// Cadastro de fornecedores e clientes. Só enxerga parceiros ativos do `kind` pedido.
#[async_trait]
pub trait CounterpartyStore: Send + Sync + 'static {
    /// Ordenados pelo nome.
    async fn list_counterparties(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        filter: &CounterpartyFilter,
    ) -> Result<Page<Counterparty>, AppError>;

    async fn find_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        id: Uuid,
    ) -> Result<Option<Counterparty>, AppError>;

    async fn insert_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        counterparty: &NewCounterparty,
    ) -> Result<Counterparty, AppError>;

    async fn update_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        id: Uuid,
        patch: &CounterpartyPatch,
    ) -> Result<Option<Counterparty>, AppError>;

    /// `false` se não havia parceiro ativo com esse id.
    async fn deactivate_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        id: Uuid,
    ) -> Result<bool, AppError>;
}

/// Agregados do painel, sempre por data-calendário em UTC.
#[async_trait]
pub trait DashboardStore: Send + Sync + 'static {
    async fn stats(&self, tenant_id: Uuid, today: NaiveDate) -> Result<DashboardStats, AppError>;

    /// Dias com movimento a partir de `since` (inclusive), em ordem crescente.
    async fn daily_totals(&self, tenant_id: Uuid, since: NaiveDate) -> Result<Vec<DailyTotals>, AppError>;
}

/// Destino do histórico. Falhas aqui nunca desfazem a operação que gerou o evento.
#[async_trait]
pub trait AuditStore: Send + Sync + 'static {
    async fn append(&self, event: &AuditEvent) -> Result<(), AppError>;

    async fn list(&self, tenant_id: Uuid, filter: &AuditFilter) -> Result<Page<AuditEntry>, AppError>;
}

/// Empresas e usuários. Fora do RLS: o login precisa achar o usuário antes de saber o tenant.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, AppError>;

    /// Cria a empresa e o seu administrador numa única transação.
    async fn register_tenant(
        &self,
        tenant: &NewTenant,
        admin: &NewUser,
    ) -> Result<(Tenant, User), AppError>;

    async fn create_user(&self, tenant_id: Uuid, user: &NewUser) -> Result<User, AppError>;

    async fn touch_last_login(&self, user_id: Uuid) -> Result<(), AppError>;
}
