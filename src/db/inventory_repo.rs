// src/db/inventory_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{begin_tenant_tx, is_unique_violation},
        error::AppError,
        pagination::{self, Page},
    },
    db::store::{InventoryStore, InventoryTx},
    models::{
        auth::Actor,
        counterparty::Counterparty,
        inventory::{
            Category, MovementFilter, MovementView, NewCategory, NewMovement, NewProduct, Product,
            ProductFilter, ProductPatch, StockMovement,
        },
    },
};

// Implementação Postgres do catálogo + livro-razão.
#[derive(Clone)]
pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, tenant_id: Uuid, filter: &ProductFilter) {
    qb.push(" WHERE tenant_id = ").push_bind(tenant_id);
    qb.push(" AND active");
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (name ILIKE ").push_bind(pattern.clone());
        qb.push(" OR barcode ILIKE ").push_bind(pattern);
        qb.push(")");
    }
    if filter.low_stock {
        qb.push(" AND stock <= min_stock");
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
}

// Movimentação + nomes do produto, do usuário e do parceiro.
const MOVEMENT_VIEW_SELECT: &str = r#"
    SELECT m.*,
           p.name AS product_name,
           p.unit AS product_unit,
           u.name AS user_name,
           c.name AS counterparty_name
    FROM stock_movements m
    JOIN products p ON p.id = m.product_id
    LEFT JOIN users u ON u.id = m.user_id
    LEFT JOIN counterparties c ON c.id = m.counterparty_id
"#;

fn push_movement_filters(qb: &mut QueryBuilder<'_, Postgres>, tenant_id: Uuid, filter: &MovementFilter) {
    qb.push(" WHERE m.tenant_id = ").push_bind(tenant_id);
    if let Some(product_id) = filter.product_id {
        qb.push(" AND m.product_id = ").push_bind(product_id);
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND m.kind = ").push_bind(kind);
    }
    // Data-calendário em UTC, inclusivo nas duas pontas
    if let Some(from) = filter.date_from {
        qb.push(" AND (m.moved_at AT TIME ZONE 'UTC')::date >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND (m.moved_at AT TIME ZONE 'UTC')::date <= ").push_bind(to);
    }
}

#[async_trait]
impl InventoryStore for InventoryRepository {
    async fn begin(&self, actor: &Actor) -> Result<Box<dyn InventoryTx>, AppError> {
        let tx = begin_tenant_tx(&self.pool, actor.tenant_id, Some(actor.user_id)).await?;
        Ok(Box::new(PgInventoryTx { tx }))
    }

    // ---
    // Funções de "Leitura" (Getters)
    // ---

    async fn find_product(&self, tenant_id: Uuid, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = $1 AND tenant_id = $2",
        )
        .bind(product_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn list_products(&self, tenant_id: Uuid, filter: &ProductFilter) -> Result<Page<Product>, AppError> {
        let (page, limit) = pagination::normalize(filter.page, filter.limit);
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count, tenant_id, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM products");
        push_product_filters(&mut select, tenant_id, filter);
        // `column()` e `as_sql()` vêm de listas fechadas, nunca do texto do cliente
        select
            .push(" ORDER BY ")
            .push(filter.sort.column())
            .push(" ")
            .push(filter.direction.as_sql())
            .push(", name ASC, id ASC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(pagination::offset(page, limit));
        let items = select.build_query_as::<Product>().fetch_all(&mut *tx).await?;

        tx.commit().await?;
        Ok(Page::new(items, total, page, limit))
    }

    async fn find_movement(&self, tenant_id: Uuid, movement_id: Uuid) -> Result<Option<MovementView>, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;
        let mut select = QueryBuilder::<Postgres>::new(MOVEMENT_VIEW_SELECT);
        select
            .push(" WHERE m.id = ")
            .push_bind(movement_id)
            .push(" AND m.tenant_id = ")
            .push_bind(tenant_id);
        let movement = select.build_query_as::<MovementView>().fetch_optional(&mut *tx).await?;
        tx.commit().await?;
        Ok(movement)
    }

    async fn list_movements(&self, tenant_id: Uuid, filter: &MovementFilter) -> Result<Page<MovementView>, AppError> {
        let (page, limit) = pagination::normalize(filter.page, filter.limit);
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM stock_movements m");
        push_movement_filters(&mut count, tenant_id, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;

        let mut select = QueryBuilder::<Postgres>::new(MOVEMENT_VIEW_SELECT);
        push_movement_filters(&mut select, tenant_id, filter);
        select
            .push(" ORDER BY m.moved_at DESC, m.created_at DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(pagination::offset(page, limit));
        let items = select.build_query_as::<MovementView>().fetch_all(&mut *tx).await?;

        tx.commit().await?;
        Ok(Page::new(items, total, page, limit))
    }

    async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<Category>, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE tenant_id = $1 ORDER BY name ASC",
        )
        .bind(tenant_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(categories)
    }
}

// ---
// Funções de "Escrita" (Transacionais)
// ---
pub struct PgInventoryTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl InventoryTx for PgInventoryTx {
    async fn lock_product(&mut self, tenant_id: Uuid, product_id: Uuid) -> Result<Option<Product>, AppError> {
        // FOR UPDATE: uma segunda transação na mesma linha espera o nosso commit
        // e então relê o saldo já atualizado.
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(product_id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(product)
    }

    async fn insert_product(&mut self, tenant_id: Uuid, product: &NewProduct) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products
                (id, tenant_id, name, barcode, unit, description, category_id,
                 purchase_price, sale_price, stock, min_stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&product.name)
        .bind(&product.barcode)
        .bind(&product.unit)
        .bind(&product.description)
        .bind(product.category_id)
        .bind(product.purchase_price)
        .bind(product.sale_price)
        .bind(product.min_stock)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::ProductNameAlreadyExists(product.name.clone());
            }
            e.into()
        })
    }

    async fn update_product(
        &mut self,
        tenant_id: Uuid,
        product_id: Uuid,
        patch: &ProductPatch,
    ) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                name = COALESCE($3, name),
                barcode = COALESCE($4, barcode),
                unit = COALESCE($5, unit),
                description = COALESCE($6, description),
                purchase_price = COALESCE($7, purchase_price),
                sale_price = COALESCE($8, sale_price),
                min_stock = COALESCE($9, min_stock),
                category_id = COALESCE($10, category_id),
                updated_at = now()
            WHERE id = $1 AND tenant_id = $2 AND active
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(tenant_id)
        .bind(&patch.name)
        .bind(&patch.barcode)
        .bind(&patch.unit)
        .bind(&patch.description)
        .bind(patch.purchase_price)
        .bind(patch.sale_price)
        .bind(patch.min_stock)
        .bind(patch.category_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::ProductNameAlreadyExists(patch.name.clone().unwrap_or_default());
            }
            AppError::from(e)
        })?
        .ok_or(AppError::ProductNotFound)
    }

    async fn deactivate_product(&mut self, tenant_id: Uuid, product_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE products SET active = FALSE, updated_at = now() WHERE id = $1 AND tenant_id = $2 AND active",
        )
        .bind(product_id)
        .bind(tenant_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ProductNotFound);
        }
        Ok(())
    }

    async fn write_stock(&mut self, tenant_id: Uuid, product_id: Uuid, stock: i32) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE products SET stock = $3, updated_at = now() WHERE id = $1 AND tenant_id = $2",
        )
        .bind(product_id)
        .bind(tenant_id)
        .bind(stock)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(AppError::ProductNotFound);
        }
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &NewMovement) -> Result<StockMovement, AppError> {
        let row = sqlx::query_as::<_, StockMovement>(
            r#"
            INSERT INTO stock_movements
                (id, tenant_id, product_id, user_id, kind, quantity, unit_price,
                 moved_at, counterparty_id, comment, reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(movement.tenant_id)
        .bind(movement.product_id)
        .bind(movement.user_id)
        .bind(movement.kind)
        .bind(movement.quantity.get())
        .bind(movement.unit_price)
        .bind(movement.moved_at)
        .bind(movement.counterparty_id)
        .bind(&movement.comment)
        .bind(&movement.reference)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn lock_movement(&mut self, tenant_id: Uuid, movement_id: Uuid) -> Result<Option<StockMovement>, AppError> {
        // Dois estornos simultâneos: o segundo espera e depois não encontra mais a linha.
        let movement = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(movement_id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(movement)
    }

    async fn delete_movement(&mut self, tenant_id: Uuid, movement_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM stock_movements WHERE id = $1 AND tenant_id = $2")
            .bind(movement_id)
            .bind(tenant_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::MovementNotFound);
        }
        Ok(())
    }

    async fn find_counterparty(
        &mut self,
        tenant_id: Uuid,
        counterparty_id: Uuid,
    ) -> Result<Option<Counterparty>, AppError> {
        // FOR SHARE: ninguém desativa o parceiro entre a checagem e o INSERT.
        let counterparty = sqlx::query_as::<_, Counterparty>(
            "SELECT * FROM counterparties WHERE id = $1 AND tenant_id = $2 FOR SHARE",
        )
        .bind(counterparty_id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(counterparty)
    }

    async fn find_category(&mut self, tenant_id: Uuid, category_id: Uuid) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE id = $1 AND tenant_id = $2 FOR SHARE",
        )
        .bind(category_id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(category)
    }

    async fn insert_category(&mut self, tenant_id: Uuid, category: &NewCategory) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, tenant_id, name, description) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&category.name)
        .bind(&category.description)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::CategoryNameAlreadyExists(category.name.clone());
            }
            e.into()
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
