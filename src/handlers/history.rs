// src/handlers/history.rs

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    common::{
        error::ApiError,
        pagination::{self, Page},
    },
    config::AppState,
    handlers::query_params,
    middleware::{
        i18n::Locale,
        rbac::{PermHistoryRead, RequirePermission},
        tenancy::TenantContext,
    },
    models::audit::{AuditAction, AuditEntry, AuditFilter},
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub product_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    #[serde(default = "pagination::default_page")]
    pub page: u32,
    #[serde(default = "pagination::default_limit")]
    pub limit: u32,
}

#[utoipa::path(
    get,
    path = "/api/history",
    tag = "History",
    params(HistoryQuery),
    responses((status = 200, description = "Histórico, mais recente primeiro", body = Page<AuditEntry>)),
    security(("api_jwt" = []))
)]
pub async fn list_history(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermHistoryRead>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let q = query_params(query, &locale)?;
    let filter = AuditFilter {
        date_from: q.date_from,
        date_to: q.date_to,
        product_id: q.product_id,
        action: q.action,
        page: q.page,
        limit: q.limit,
    };

    let page = app_state
        .audit_service
        .list(tenant.0, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(page))
}
