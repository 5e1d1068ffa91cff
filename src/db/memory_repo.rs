// src/db/memory_repo.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        pagination::{self, Page},
    },
    db::store::{AuditStore, CounterpartyStore, DashboardStore, InventoryStore, InventoryTx, UserStore},
    models::{
        audit::{AuditEntry, AuditEvent, AuditFilter},
        auth::{Actor, NewTenant, NewUser, Tenant, User},
        counterparty::{
            Counterparty, CounterpartyFilter, CounterpartyKind, CounterpartyPatch, NewCounterparty,
        },
        dashboard::{
            fold_daily, DailyTotals, DashboardStats, LowStockItem, LOW_STOCK_ALERTS,
        },
        inventory::{
            Category, MovementFilter, MovementKind, MovementView, NewCategory, NewMovement,
            NewProduct, Product, ProductFilter, ProductPatch, StockMovement,
        },
    },
};

/// Ponto onde a próxima transação vai falhar (usado nos testes de atomicidade).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertMovement,
    WriteStock,
    DeleteMovement,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    products: HashMap<Uuid, Product>,
    // (sequência de criação, movimentação)
    movements: Vec<(u64, StockMovement)>,
    seq: u64,
    categories: HashMap<Uuid, Category>,
    counterparties: HashMap<Uuid, Counterparty>,
}

impl LedgerState {
    fn active_counterparty(&self, tenant_id: Uuid, kind: CounterpartyKind, id: Uuid) -> Option<&Counterparty> {
        self.counterparties
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id && c.kind == kind && c.active)
    }

    fn active_counterparty_mut(
        &mut self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        id: Uuid,
    ) -> Option<&mut Counterparty> {
        self.counterparties
            .get_mut(&id)
            .filter(|c| c.tenant_id == tenant_id && c.kind == kind && c.active)
    }
}

/// Catálogo + livro-razão em memória. Para testes e desenvolvimento.
///
/// Uma transação segura o mutex do estado inteiro e trabalha sobre uma cópia;
/// a cópia só substitui o estado no commit, o drop sem commit a descarta.
#[derive(Debug, Clone, Default)]
pub struct MemoryInventoryStore {
    state: Arc<Mutex<LedgerState>>,
    fail_next: Arc<StdMutex<Option<FailPoint>>>,
    // Para resolver o nome do usuário nas consultas de movimentações
    users: Option<MemoryUserStore>,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(mut self, users: MemoryUserStore) -> Self {
        self.users = Some(users);
        self
    }

    fn view(&self, state: &LedgerState, movement: &StockMovement) -> MovementView {
        let product = state.products.get(&movement.product_id);
        MovementView {
            movement: movement.clone(),
            product_name: product.map(|p| p.name.clone()).unwrap_or_default(),
            product_unit: product.map(|p| p.unit.clone()).unwrap_or_default(),
            user_name: self.users.as_ref().and_then(|u| u.user_name(movement.user_id)),
            counterparty_name: movement
                .counterparty_id
                .and_then(|id| state.counterparties.get(&id))
                .map(|c| c.name.clone()),
        }
    }

    /// Arma uma falha na próxima transação aberta.
    pub fn fail_next(&self, point: FailPoint) {
        if let Ok(mut slot) = self.fail_next.lock() {
            *slot = Some(point);
        }
    }

    fn take_fault(&self) -> Option<FailPoint> {
        self.fail_next.lock().ok().and_then(|mut slot| slot.take())
    }
}

fn injected(point: FailPoint) -> AppError {
    AppError::InternalServerError(anyhow::anyhow!("falha injetada em {point:?}"))
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn begin(&self, _actor: &Actor) -> Result<Box<dyn InventoryTx>, AppError> {
        let fault = self.take_fault();
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryInventoryTx { guard, staged, fault }))
    }

    async fn find_product(&self, tenant_id: Uuid, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .get(&product_id)
            .filter(|p| p.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_products(&self, tenant_id: Uuid, filter: &ProductFilter) -> Result<Page<Product>, AppError> {
        let (page, limit) = pagination::normalize(filter.page, filter.limit);
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.active)
            .filter(|p| !filter.low_stock || p.is_low_stock())
            .filter(|p| filter.category_id.is_none_or(|c| p.category_id == Some(c)))
            .filter(|p| match &needle {
                Some(n) => {
                    p.name.to_lowercase().contains(n)
                        || p.barcode.as_deref().is_some_and(|b| b.to_lowercase().contains(n))
                }
                None => true,
            })
            .cloned()
            .collect();
        products.sort_by(|a, b| filter.ordering(a, b));
        Ok(Page::slice(products, page, limit))
    }

    async fn find_movement(&self, tenant_id: Uuid, movement_id: Uuid) -> Result<Option<MovementView>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .movements
            .iter()
            .map(|(_, m)| m)
            .find(|m| m.id == movement_id && m.tenant_id == tenant_id)
            .map(|m| self.view(&state, m)))
    }

    async fn list_movements(&self, tenant_id: Uuid, filter: &MovementFilter) -> Result<Page<MovementView>, AppError> {
        let (page, limit) = pagination::normalize(filter.page, filter.limit);
        let state = self.state.lock().await;
        let mut rows: Vec<&(u64, StockMovement)> = state
            .movements
            .iter()
            .filter(|(_, m)| m.tenant_id == tenant_id && filter.matches(m))
            .collect();
        rows.sort_by(|(seq_a, a), (seq_b, b)| b.moved_at.cmp(&a.moved_at).then(seq_b.cmp(seq_a)));
        let movements = rows.into_iter().map(|(_, m)| self.view(&state, m)).collect();
        Ok(Page::slice(movements, page, limit))
    }

    async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<Category>, AppError> {
        let state = self.state.lock().await;
        let mut categories: Vec<Category> = state
            .categories
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

#[async_trait]
impl CounterpartyStore for MemoryInventoryStore {
    async fn list_counterparties(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        filter: &CounterpartyFilter,
    ) -> Result<Page<Counterparty>, AppError> {
        let (page, limit) = pagination::normalize(filter.page, filter.limit);
        let state = self.state.lock().await;
        let mut rows: Vec<Counterparty> = state
            .counterparties
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.kind == kind && c.active)
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(Page::slice(rows, page, limit))
    }

    async fn find_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        id: Uuid,
    ) -> Result<Option<Counterparty>, AppError> {
        let state = self.state.lock().await;
        Ok(state.active_counterparty(tenant_id, kind, id).cloned())
    }

    async fn insert_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        counterparty: &NewCounterparty,
    ) -> Result<Counterparty, AppError> {
        let now = Utc::now();
        let row = Counterparty {
            id: Uuid::new_v4(),
            tenant_id,
            kind,
            name: counterparty.name.clone(),
            phone: counterparty.phone.clone(),
            email: counterparty.email.clone(),
            address: counterparty.address.clone(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.counterparties.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        id: Uuid,
        patch: &CounterpartyPatch,
    ) -> Result<Option<Counterparty>, AppError> {
        let mut state = self.state.lock().await;
        let Some(row) = state.active_counterparty_mut(tenant_id, kind, id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            row.name = name.clone();
        }
        if let Some(phone) = &patch.phone {
            row.phone = Some(phone.clone());
        }
        if let Some(email) = &patch.email {
            row.email = Some(email.clone());
        }
        if let Some(address) = &patch.address {
            row.address = Some(address.clone());
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn deactivate_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        let Some(row) = state.active_counterparty_mut(tenant_id, kind, id) else {
            return Ok(false);
        };
        row.active = false;
        row.updated_at = Utc::now();
        Ok(true)
    }
}

// Linhas por movimentação, no mesmo formato que o agregado do Postgres.
fn movement_rows<'a>(
    state: &'a LedgerState,
    tenant_id: Uuid,
    since: NaiveDate,
) -> impl Iterator<Item = (NaiveDate, MovementKind, i64, i64)> + 'a {
    state
        .movements
        .iter()
        .map(|(_, m)| m)
        .filter(move |m| m.tenant_id == tenant_id && m.moved_at.date_naive() >= since)
        .map(|m| (m.moved_at.date_naive(), m.kind, 1, i64::from(m.quantity)))
}

#[async_trait]
impl DashboardStore for MemoryInventoryStore {
    async fn stats(&self, tenant_id: Uuid, today: NaiveDate) -> Result<DashboardStats, AppError> {
        let state = self.state.lock().await;
        let active: Vec<&Product> = state
            .products
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.active)
            .collect();

        let stock_value_purchase: Decimal = active
            .iter()
            .map(|p| Decimal::from(p.stock) * p.purchase_price)
            .sum();
        let stock_value_sale: Decimal = active.iter().map(|p| Decimal::from(p.stock) * p.sale_price).sum();

        let mut low: Vec<&Product> = active.iter().copied().filter(|p| p.is_low_stock()).collect();
        low.sort_by(|a, b| a.stock.cmp(&b.stock).then(a.name.cmp(&b.name)));
        let low_stock_count = low.len() as i64;
        let low_stock = low
            .into_iter()
            .take(LOW_STOCK_ALERTS)
            .map(|p| LowStockItem {
                id: p.id,
                name: p.name.clone(),
                stock: p.stock,
                min_stock: p.min_stock,
            })
            .collect();

        let today_rows = movement_rows(&state, tenant_id, today).filter(|(day, ..)| *day == today);
        let today_totals = fold_daily(today_rows)
            .into_iter()
            .next()
            .unwrap_or_else(|| DailyTotals::empty(today));

        Ok(DashboardStats {
            active_products: active.len() as i64,
            stock_value_purchase,
            stock_value_sale,
            today: today_totals,
            low_stock_count,
            low_stock,
        })
    }

    async fn daily_totals(&self, tenant_id: Uuid, since: NaiveDate) -> Result<Vec<DailyTotals>, AppError> {
        let state = self.state.lock().await;
        Ok(fold_daily(movement_rows(&state, tenant_id, since)))
    }
}

pub struct MemoryInventoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    staged: LedgerState,
    fault: Option<FailPoint>,
}

impl MemoryInventoryTx {
    fn check(&self, point: FailPoint) -> Result<(), AppError> {
        match self.fault {
            Some(armed) if armed == point => Err(injected(point)),
            _ => Ok(()),
        }
    }

    fn product_mut(&mut self, tenant_id: Uuid, product_id: Uuid) -> Option<&mut Product> {
        self.staged
            .products
            .get_mut(&product_id)
            .filter(|p| p.tenant_id == tenant_id)
    }

    fn category_name_taken(&self, tenant_id: Uuid, name: &str) -> bool {
        self.staged
            .categories
            .values()
            .any(|c| c.tenant_id == tenant_id && c.name == name)
    }

    fn name_taken(&self, tenant_id: Uuid, name: &str, except: Option<Uuid>) -> bool {
        self.staged.products.values().any(|p| {
            p.tenant_id == tenant_id && p.active && p.name == name && Some(p.id) != except
        })
    }
}

#[async_trait]
impl InventoryTx for MemoryInventoryTx {
    async fn lock_product(&mut self, tenant_id: Uuid, product_id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.product_mut(tenant_id, product_id).map(|p| p.clone()))
    }

    async fn insert_product(&mut self, tenant_id: Uuid, product: &NewProduct) -> Result<Product, AppError> {
        if self.name_taken(tenant_id, &product.name, None) {
            return Err(AppError::ProductNameAlreadyExists(product.name.clone()));
        }
        let now = Utc::now();
        let row = Product {
            id: Uuid::new_v4(),
            tenant_id,
            name: product.name.clone(),
            barcode: product.barcode.clone(),
            unit: product.unit.clone(),
            description: product.description.clone(),
            category_id: product.category_id,
            purchase_price: product.purchase_price,
            sale_price: product.sale_price,
            stock: 0,
            min_stock: product.min_stock,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.staged.products.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_product(
        &mut self,
        tenant_id: Uuid,
        product_id: Uuid,
        patch: &ProductPatch,
    ) -> Result<Product, AppError> {
        if let Some(name) = &patch.name {
            if self.name_taken(tenant_id, name, Some(product_id)) {
                return Err(AppError::ProductNameAlreadyExists(name.clone()));
            }
        }
        let product = self
            .product_mut(tenant_id, product_id)
            .filter(|p| p.active)
            .ok_or(AppError::ProductNotFound)?;

        if let Some(name) = &patch.name {
            product.name = name.clone();
        }
        if let Some(barcode) = &patch.barcode {
            product.barcode = Some(barcode.clone());
        }
        if let Some(unit) = &patch.unit {
            product.unit = unit.clone();
        }
        if let Some(description) = &patch.description {
            product.description = Some(description.clone());
        }
        if let Some(category_id) = patch.category_id {
            product.category_id = Some(category_id);
        }
        if let Some(price) = patch.purchase_price {
            product.purchase_price = price;
        }
        if let Some(price) = patch.sale_price {
            product.sale_price = price;
        }
        if let Some(min_stock) = patch.min_stock {
            product.min_stock = min_stock;
        }
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn deactivate_product(&mut self, tenant_id: Uuid, product_id: Uuid) -> Result<(), AppError> {
        let product = self
            .product_mut(tenant_id, product_id)
            .filter(|p| p.active)
            .ok_or(AppError::ProductNotFound)?;
        product.active = false;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn write_stock(&mut self, tenant_id: Uuid, product_id: Uuid, stock: i32) -> Result<(), AppError> {
        self.check(FailPoint::WriteStock)?;
        let product = self
            .product_mut(tenant_id, product_id)
            .ok_or(AppError::ProductNotFound)?;
        product.stock = stock;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &NewMovement) -> Result<StockMovement, AppError> {
        self.check(FailPoint::InsertMovement)?;
        let row = StockMovement {
            id: Uuid::new_v4(),
            tenant_id: movement.tenant_id,
            product_id: movement.product_id,
            user_id: movement.user_id,
            kind: movement.kind,
            quantity: movement.quantity.get(),
            unit_price: movement.unit_price,
            moved_at: movement.moved_at,
            counterparty_id: movement.counterparty_id,
            comment: movement.comment.clone(),
            reference: movement.reference.clone(),
            created_at: Utc::now(),
        };
        self.staged.seq += 1;
        self.staged.movements.push((self.staged.seq, row.clone()));
        Ok(row)
    }

    async fn lock_movement(&mut self, tenant_id: Uuid, movement_id: Uuid) -> Result<Option<StockMovement>, AppError> {
        Ok(self
            .staged
            .movements
            .iter()
            .map(|(_, m)| m)
            .find(|m| m.id == movement_id && m.tenant_id == tenant_id)
            .cloned())
    }

    async fn delete_movement(&mut self, tenant_id: Uuid, movement_id: Uuid) -> Result<(), AppError> {
        self.check(FailPoint::DeleteMovement)?;
        let before = self.staged.movements.len();
        self.staged
            .movements
            .retain(|(_, m)| !(m.id == movement_id && m.tenant_id == tenant_id));
        if self.staged.movements.len() == before {
            return Err(AppError::MovementNotFound);
        }
        Ok(())
    }

    async fn find_counterparty(
        &mut self,
        tenant_id: Uuid,
        counterparty_id: Uuid,
    ) -> Result<Option<Counterparty>, AppError> {
        Ok(self
            .staged
            .counterparties
            .get(&counterparty_id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_category(&mut self, tenant_id: Uuid, category_id: Uuid) -> Result<Option<Category>, AppError> {
        Ok(self
            .staged
            .categories
            .get(&category_id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn insert_category(&mut self, tenant_id: Uuid, category: &NewCategory) -> Result<Category, AppError> {
        if self.category_name_taken(tenant_id, &category.name) {
            return Err(AppError::CategoryNameAlreadyExists(category.name.clone()));
        }
        let row = Category {
            id: Uuid::new_v4(),
            tenant_id,
            name: category.name.clone(),
            description: category.description.clone(),
            created_at: Utc::now(),
        };
        self.staged.categories.insert(row.id, row.clone());
        Ok(row)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), AppError> {
        self.check(FailPoint::Commit)?;
        *self.guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}

/// Histórico em memória, com opção de simular indisponibilidade.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditStore {
    entries: Arc<StdMutex<Vec<AuditEntry>>>,
    unavailable: Arc<StdMutex<bool>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut flag) = self.unavailable.lock() {
            *flag = unavailable;
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, event: &AuditEvent) -> Result<(), AppError> {
        if self.unavailable.lock().map(|f| *f).unwrap_or(false) {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        let entry = AuditEntry::from_event(event, Utc::now());
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("mutex do histórico envenenado"))?
            .push(entry);
        Ok(())
    }

    async fn list(&self, tenant_id: Uuid, filter: &AuditFilter) -> Result<Page<AuditEntry>, AppError> {
        let (page, limit) = pagination::normalize(filter.page, filter.limit);
        let mut rows: Vec<AuditEntry> = self
            .entries()
            .into_iter()
            .filter(|e| e.tenant_id == tenant_id && filter.matches(e))
            .collect();
        // `entries` guarda em ordem de inserção: invertendo, os mais novos vêm primeiro
        rows.reverse();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::slice(rows, page, limit))
    }
}

#[derive(Debug, Default)]
struct Directory {
    tenants: HashMap<Uuid, Tenant>,
    users: HashMap<Uuid, User>,
}

impl Directory {
    fn email_taken(&self, email: &str) -> bool {
        self.users.values().any(|u| u.email == email)
    }

    fn insert_user(&mut self, tenant_id: Uuid, user: &NewUser) -> Result<User, AppError> {
        if self.email_taken(&user.email) {
            return Err(AppError::EmailAlreadyExists);
        }
        let now = Utc::now();
        let row = User {
            id: Uuid::new_v4(),
            tenant_id,
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(row.id, row.clone());
        Ok(row)
    }
}

/// Empresas e usuários em memória.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    directory: Arc<StdMutex<Directory>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn directory(&self) -> Result<std::sync::MutexGuard<'_, Directory>, AppError> {
        self.directory
            .lock()
            .map_err(|_| anyhow::anyhow!("mutex de usuários envenenado").into())
    }

    pub fn user_name(&self, user_id: Uuid) -> Option<String> {
        self.directory.lock().ok()?.users.get(&user_id).map(|u| u.name.clone())
    }

    /// Desativa um usuário (sem rota própria; usado nos testes de login).
    pub fn deactivate_user(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut dir = self.directory()?;
        let user = dir.users.get_mut(&user_id).ok_or(AppError::UserNotFound)?;
        user.active = false;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.directory()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.directory()?.users.get(&user_id).cloned())
    }

    async fn find_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, AppError> {
        Ok(self.directory()?.tenants.get(&tenant_id).cloned())
    }

    async fn register_tenant(
        &self,
        tenant: &NewTenant,
        admin: &NewUser,
    ) -> Result<(Tenant, User), AppError> {
        let mut dir = self.directory()?;
        if dir.tenants.values().any(|t| t.email == tenant.email) {
            return Err(AppError::EmailAlreadyExists);
        }
        let created = Tenant {
            id: Uuid::new_v4(),
            name: tenant.name.clone(),
            email: tenant.email.clone(),
            active: true,
            created_at: Utc::now(),
        };
        // Valida o administrador antes de gravar a empresa: tudo ou nada.
        let user = dir.insert_user(created.id, admin)?;
        dir.tenants.insert(created.id, created.clone());
        Ok((created, user))
    }

    async fn create_user(&self, tenant_id: Uuid, user: &NewUser) -> Result<User, AppError> {
        self.directory()?.insert_user(tenant_id, user)
    }

    async fn touch_last_login(&self, user_id: Uuid) -> Result<(), AppError> {
        if let Some(user) = self.directory()?.users.get_mut(&user_id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }
}
