// src/services/dashboard_service.rs

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{
    common::error::AppError,
    db::DashboardStore,
    models::dashboard::{DailyTotals, DashboardStats},
};

// Períodos aceitos pelo gráfico, em dias
pub const CHART_PERIODS: [u32; 3] = [7, 30, 90];
pub const DEFAULT_CHART_PERIOD: u32 = 30;

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn DashboardStore>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn DashboardStore>) -> Self {
        Self { store }
    }

    /// Números do painel para o dia `today` (UTC).
    pub async fn stats(&self, tenant_id: Uuid, today: NaiveDate) -> Result<DashboardStats, AppError> {
        self.store.stats(tenant_id, today).await
    }

    /// Entradas e saídas por dia nos últimos `period` dias. Dias sem movimento não aparecem.
    pub async fn chart(
        &self,
        tenant_id: Uuid,
        period: Option<u32>,
        today: NaiveDate,
    ) -> Result<Vec<DailyTotals>, AppError> {
        let period = period.unwrap_or(DEFAULT_CHART_PERIOD);
        if !CHART_PERIODS.contains(&period) {
            let mut errors = ValidationErrors::new();
            errors.add(
                "period",
                ValidationError::new("range").with_message("Period must be 7, 30 or 90 days.".into()),
            );
            return Err(AppError::ValidationError(errors));
        }
        let since = today
            .checked_sub_days(Days::new(u64::from(period)))
            .ok_or_else(|| anyhow::anyhow!("data fora do intervalo: {today} - {period} dias"))?;
        self.store.daily_totals(tenant_id, since).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        db::{MemoryAuditStore, MemoryInventoryStore},
        models::{
            auth::{Actor, Role},
            inventory::{MovementKind, MovementRequest, NewProduct},
        },
        services::{AuditService, InventoryService},
    };

    struct Fixture {
        dashboard: DashboardService,
        inventory: InventoryService,
        admin: Actor,
    }

    fn fixture() -> Fixture {
        let store = MemoryInventoryStore::new();
        let audit = AuditService::new(Arc::new(MemoryAuditStore::new()));
        Fixture {
            dashboard: DashboardService::new(Arc::new(store.clone())),
            inventory: InventoryService::new(Arc::new(store), audit),
            admin: Actor { user_id: Uuid::new_v4(), tenant_id: Uuid::new_v4(), role: Role::Admin },
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    impl Fixture {
        async fn product(&self, name: &str, purchase: i64, sale: i64, min_stock: i32) -> Uuid {
            let product = NewProduct {
                name: name.into(),
                barcode: None,
                unit: "unit".into(),
                description: None,
                category_id: None,
                purchase_price: Decimal::from(purchase),
                sale_price: Decimal::from(sale),
                min_stock,
            };
            self.inventory.create_product(&self.admin, product, 0).await.unwrap().id
        }

        async fn move_on(&self, kind: MovementKind, product_id: Uuid, qty: i32, d: u32) {
            let mut request = MovementRequest::new(kind, product_id, qty);
            request.moved_at = Some(Utc.with_ymd_and_hms(2025, 6, d, 10, 0, 0).unwrap());
            self.inventory.record_movement(&self.admin, request).await.unwrap();
        }
    }

    #[tokio::test]
    async fn stats_value_the_stock_and_count_today() {
        let fx = fixture();
        let rice = fx.product("Riz", 10, 15, 5).await;
        let oil = fx.product("Huile", 20, 30, 5).await;
        fx.product("Sucre", 1, 2, 5).await;

        fx.move_on(MovementKind::Entry, rice, 8, 14).await;
        fx.move_on(MovementKind::Entry, oil, 4, 15).await;
        fx.move_on(MovementKind::Exit, rice, 2, 15).await;
        fx.move_on(MovementKind::Exit, rice, 1, 15).await;

        let stats = fx.dashboard.stats(fx.admin.tenant_id, day(15)).await.unwrap();
        assert_eq!(stats.active_products, 3);
        // Riz 5 x 10 + Huile 4 x 20
        assert_eq!(stats.stock_value_purchase, Decimal::from(130));
        assert_eq!(stats.stock_value_sale, Decimal::from(5 * 15 + 4 * 30));
        assert_eq!(stats.today.entries, 4);
        assert_eq!(stats.today.exits, 3);
        assert_eq!(stats.today.exit_movements, 2);

        // Sucre 0, Huile 4, Riz 5: todos no limite ou abaixo
        assert_eq!(stats.low_stock_count, 3);
        let names: Vec<&str> = stats.low_stock.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Sucre", "Huile", "Riz"]);
    }

    #[tokio::test]
    async fn chart_only_lists_days_with_movements_inside_the_period() {
        let fx = fixture();
        let rice = fx.product("Riz", 10, 15, 0).await;
        fx.move_on(MovementKind::Entry, rice, 50, 1).await;
        fx.move_on(MovementKind::Entry, rice, 9, 25).await;
        fx.move_on(MovementKind::Exit, rice, 4, 27).await;
        fx.move_on(MovementKind::Exit, rice, 6, 27).await;

        let week = fx.dashboard.chart(fx.admin.tenant_id, Some(7), day(30)).await.unwrap();
        assert_eq!(week.len(), 2);
        assert_eq!(week[0], DailyTotals { day: day(25), entries: 9, exits: 0, entry_movements: 1, exit_movements: 0 });
        assert_eq!(week[1].exits, 10);
        assert_eq!(week[1].exit_movements, 2);

        let month = fx.dashboard.chart(fx.admin.tenant_id, None, day(30)).await.unwrap();
        assert_eq!(month.first().map(|d| d.day), Some(day(1)));
    }

    #[tokio::test]
    async fn unsupported_period_is_a_validation_error() {
        let fx = fixture();
        let err = fx.dashboard.chart(fx.admin.tenant_id, Some(14), day(30)).await.unwrap_err();
        let AppError::ValidationError(errors) = err else {
            panic!("expected a validation error");
        };
        assert!(errors.field_errors().contains_key("period"));
    }

    #[tokio::test]
    async fn other_tenants_see_an_empty_dashboard() {
        let fx = fixture();
        let rice = fx.product("Riz", 10, 15, 0).await;
        fx.move_on(MovementKind::Entry, rice, 3, 15).await;

        let stranger = Uuid::new_v4();
        let stats = fx.dashboard.stats(stranger, day(15)).await.unwrap();
        assert_eq!(stats.active_products, 0);
        assert_eq!(stats.stock_value_purchase, Decimal::ZERO);
        assert_eq!(stats.today, DailyTotals::empty(day(15)));
        assert!(fx.dashboard.chart(stranger, Some(90), day(15)).await.unwrap().is_empty());
    }
}
