// src/db/counterparty_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::begin_tenant_tx,
        error::AppError,
        pagination::{self, Page},
    },
    db::store::CounterpartyStore,
    models::counterparty::{
        Counterparty, CounterpartyFilter, CounterpartyKind, CounterpartyPatch, NewCounterparty,
    },
};

// Fornecedores e clientes no Postgres.
#[derive(Clone)]
pub struct CounterpartyRepository {
    pool: PgPool,
}

impl CounterpartyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_counterparty_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    tenant_id: Uuid,
    kind: CounterpartyKind,
    filter: &CounterpartyFilter,
) {
    qb.push(" WHERE tenant_id = ").push_bind(tenant_id);
    qb.push(" AND kind = ").push_bind(kind);
    qb.push(" AND active");
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (name ILIKE ").push_bind(pattern.clone());
        qb.push(" OR phone ILIKE ").push_bind(pattern.clone());
        qb.push(" OR email ILIKE ").push_bind(pattern);
        qb.push(")");
    }
}

#[async_trait]
impl CounterpartyStore for CounterpartyRepository {
    async fn list_counterparties(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        filter: &CounterpartyFilter,
    ) -> Result<Page<Counterparty>, AppError> {
        let (page, limit) = pagination::normalize(filter.page, filter.limit);
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM counterparties");
        push_counterparty_filters(&mut count, tenant_id, kind, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM counterparties");
        push_counterparty_filters(&mut select, tenant_id, kind, filter);
        select
            .push(" ORDER BY name ASC, id ASC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(pagination::offset(page, limit));
        let items = select.build_query_as::<Counterparty>().fetch_all(&mut *tx).await?;

        tx.commit().await?;
        Ok(Page::new(items, total, page, limit))
    }

    async fn find_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        id: Uuid,
    ) -> Result<Option<Counterparty>, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;
        let row = sqlx::query_as::<_, Counterparty>(
            "SELECT * FROM counterparties WHERE id = $1 AND tenant_id = $2 AND kind = $3 AND active",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(kind)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn insert_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        counterparty: &NewCounterparty,
    ) -> Result<Counterparty, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;
        let row = sqlx::query_as::<_, Counterparty>(
            r#"
            INSERT INTO counterparties (id, tenant_id, kind, name, phone, email, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(kind)
        .bind(&counterparty.name)
        .bind(&counterparty.phone)
        .bind(&counterparty.email)
        .bind(&counterparty.address)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn update_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        id: Uuid,
        patch: &CounterpartyPatch,
    ) -> Result<Option<Counterparty>, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;
        let row = sqlx::query_as::<_, Counterparty>(
            r#"
            UPDATE counterparties SET
                name = COALESCE($4, name),
                phone = COALESCE($5, phone),
                email = COALESCE($6, email),
                address = COALESCE($7, address),
                updated_at = now()
            WHERE id = $1 AND tenant_id = $2 AND kind = $3 AND active
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(kind)
        .bind(&patch.name)
        .bind(&patch.phone)
        .bind(&patch.email)
        .bind(&patch.address)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn deactivate_counterparty(
        &self,
        tenant_id: Uuid,
        kind: CounterpartyKind,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;
        let result = sqlx::query(
            r#"
            UPDATE counterparties SET active = FALSE, updated_at = now()
            WHERE id = $1 AND tenant_id = $2 AND kind = $3 AND active
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(kind)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
