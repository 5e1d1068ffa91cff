// src/db/dashboard_repo.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::{db_utils::begin_tenant_tx, error::AppError},
    db::store::DashboardStore,
    models::{
        dashboard::{
            fold_daily, DailyTotals, DashboardStats, LowStockItem, LOW_STOCK_ALERTS,
        },
        inventory::MovementKind,
    },
};

#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Linhas (dia, tipo, nº de movimentações, quantidade) a partir de `since`.
// Com `until`, o intervalo é fechado nas duas pontas.
async fn daily_rows(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    since: NaiveDate,
    until: Option<NaiveDate>,
) -> Result<Vec<(NaiveDate, MovementKind, i64, i64)>, AppError> {
    let rows = sqlx::query_as::<_, (NaiveDate, MovementKind, i64, i64)>(
        r#"
        SELECT (moved_at AT TIME ZONE 'UTC')::date AS day,
               kind,
               COUNT(*) AS movements,
               SUM(quantity)::BIGINT AS quantity
        FROM stock_movements
        WHERE tenant_id = $1
          AND (moved_at AT TIME ZONE 'UTC')::date >= $2
          AND ($3::date IS NULL OR (moved_at AT TIME ZONE 'UTC')::date <= $3)
        GROUP BY day, kind
        ORDER BY day ASC
        "#,
    )
    .bind(tenant_id)
    .bind(since)
    .bind(until)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

#[async_trait]
impl DashboardStore for DashboardRepository {
    async fn stats(&self, tenant_id: Uuid, today: NaiveDate) -> Result<DashboardStats, AppError> {
        // Uma transação só: todos os números saem do mesmo snapshot
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;

        // A. Produtos ativos e valor do estoque
        let (active_products, stock_value_purchase, stock_value_sale, low_stock_count) =
            sqlx::query_as::<_, (i64, Decimal, Decimal, i64)>(
                r#"
                SELECT COUNT(*),
                       COALESCE(SUM(stock * purchase_price), 0),
                       COALESCE(SUM(stock * sale_price), 0),
                       COUNT(*) FILTER (WHERE stock <= min_stock)
                FROM products
                WHERE tenant_id = $1 AND active
                "#,
            )
            .bind(tenant_id)
            .fetch_one(&mut *tx)
            .await?;

        // B. Alertas de estoque baixo
        let low_stock = sqlx::query_as::<_, LowStockItem>(
            r#"
            SELECT id, name, stock, min_stock
            FROM products
            WHERE tenant_id = $1 AND active AND stock <= min_stock
            ORDER BY stock ASC, name ASC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(LOW_STOCK_ALERTS as i64)
        .fetch_all(&mut *tx)
        .await?;

        // C. Entradas e saídas de hoje
        let rows = daily_rows(&mut tx, tenant_id, today, Some(today)).await?;
        let today_totals = fold_daily(rows)
            .into_iter()
            .next()
            .unwrap_or_else(|| DailyTotals::empty(today));

        tx.commit().await?;

        Ok(DashboardStats {
            active_products,
            stock_value_purchase,
            stock_value_sale,
            today: today_totals,
            low_stock_count,
            low_stock,
        })
    }

    async fn daily_totals(&self, tenant_id: Uuid, since: NaiveDate) -> Result<Vec<DailyTotals>, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id, None).await?;
        let rows = daily_rows(&mut tx, tenant_id, since, None).await?;
        tx.commit().await?;
        Ok(fold_daily(rows))
    }
}
