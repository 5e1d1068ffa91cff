// src/db/audit_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::begin_tenant_tx,
        error::AppError,
        pagination::{self, Page},
    },
    db::store::AuditStore,
    models::audit::{AuditEntry, AuditEvent, AuditFilter, EntityType},
};

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_audit_filters(qb: &mut QueryBuilder<'_, Postgres>, tenant_id: Uuid, filter: &AuditFilter) {
    qb.push(" WHERE tenant_id = ").push_bind(tenant_id);
    if let Some(from) = filter.date_from {
        qb.push(" AND (created_at AT TIME ZONE 'UTC')::date >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND (created_at AT TIME ZONE 'UTC')::date <= ").push_bind(to);
    }
    if let Some(product_id) = filter.product_id {
        qb.push(" AND entity_type = ").push_bind(EntityType::Product.as_str());
        qb.push(" AND entity_id = ").push_bind(product_id);
    }
    if let Some(action) = filter.action {
        qb.push(" AND action = ").push_bind(action.as_str());
    }
}

#[async_trait]
impl AuditStore for AuditRepository {
    async fn append(&self, event: &AuditEvent) -> Result<(), AppError> {
        let mut tx = begin_tenant_tx(&self.pool, event.tenant_id, Some(event.user_id)).await?;
        sqlx::query(
            r#"
            INSERT INTO audit_log
                (id, tenant_id, user_id, action, entity_type, entity_id, description, before, after)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.tenant_id)
        .bind(event.user_id)
        .bind(event.action.as_str())
        .bind(event.entity_type.as_str())
        .bind(event.entity_id)
        .bind(&event.description)
        .bind(&event.before)
        .bind(&event.after)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list(&self, tenant_id: Uuid, filter: &AuditFilter) -> Result<Page<AuditEntry>, AppError> {
        let (page, limit) = pagination::normalize(filter.page, filter.limit);
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_log");
        push_audit_filters(&mut count, tenant_id, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM audit_log");
        push_audit_filters(&mut select, tenant_id, filter);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(pagination::offset(page, limit));
        let items = select.build_query_as::<AuditEntry>().fetch_all(&mut *tx).await?;

        tx.commit().await?;
        Ok(Page::new(items, total, page, limit))
    }
}
