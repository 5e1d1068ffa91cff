// src/handlers/dashboard.rs

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    common::error::ApiError,
    config::AppState,
    handlers::query_params,
    middleware::{
        i18n::Locale,
        rbac::{PermDashboardRead, RequirePermission},
        tenancy::TenantContext,
    },
    models::dashboard::{DailyTotals, DashboardStats},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChartQuery {
    /// 7, 30 ou 90 dias (padrão: 30)
    pub period: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    tag = "Dashboard",
    responses((status = 200, description = "Resumo do estoque e do dia (UTC)", body = DashboardStats)),
    security(("api_jwt" = []))
)]
pub async fn get_stats(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermDashboardRead>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = app_state
        .dashboard_service
        .stats(tenant.0, Utc::now().date_naive())
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(stats))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/chart",
    tag = "Dashboard",
    params(ChartQuery),
    responses(
        (status = 200, description = "Entradas e saídas por dia, só dias com movimento", body = [DailyTotals]),
        (status = 400, description = "Período não suportado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_chart(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermDashboardRead>,
    query: Result<Query<ChartQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let q = query_params(query, &locale)?;
    let days = app_state
        .dashboard_service
        .chart(tenant.0, q.period, Utc::now().date_naive())
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(days))
}
