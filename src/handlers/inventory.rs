// src/handlers/inventory.rs

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        pagination::{self, Page},
    },
    config::AppState,
    handlers::{json_body, query_params},
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermInventoryCancel, PermInventoryRead, PermInventoryWrite, RequirePermission},
    },
    models::{
        auth::Actor,
        inventory::{
            MovementFilter, MovementKind, MovementReceipt, MovementRequest, MovementView,
            ReversalReceipt,
        },
    },
};

// ---
// Payload: entrada ou saída (o tipo vem da rota)
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementPayload {
    pub product_id: Uuid,

    // Decimal para poder recusar 2.5 com INVALID_QUANTITY em vez de erro de parse
    #[schema(value_type = f64, example = 20)]
    pub quantity: Decimal,

    // Sem preço: usa o preço de compra (entrada) ou de venda (saída) do produto
    #[schema(value_type = Option<f64>)]
    pub unit_price: Option<Decimal>,

    // Fornecedor (entrada) ou cliente (saída)
    pub counterparty_id: Option<Uuid>,

    pub moved_at: Option<DateTime<Utc>>,

    #[validate(length(max = 500, message = "Comment is too long."))]
    pub comment: Option<String>,

    #[validate(length(max = 100, message = "Reference is too long."))]
    pub reference: Option<String>,
}

impl MovementPayload {
    fn into_request(self, kind: MovementKind) -> MovementRequest {
        MovementRequest {
            kind,
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            counterparty_id: self.counterparty_id,
            moved_at: self.moved_at,
            comment: self.comment,
            reference: self.reference,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MovementQuery {
    pub product_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
    /// Inclusivo (data UTC)
    pub date_from: Option<NaiveDate>,
    /// Inclusivo (data UTC)
    pub date_to: Option<NaiveDate>,
    #[serde(default = "pagination::default_page")]
    pub page: u32,
    #[serde(default = "pagination::default_limit")]
    pub limit: u32,
}

impl From<MovementQuery> for MovementFilter {
    fn from(q: MovementQuery) -> Self {
        MovementFilter {
            product_id: q.product_id,
            kind: q.kind,
            date_from: q.date_from,
            date_to: q.date_to,
            page: q.page,
            limit: q.limit,
        }
    }
}

async fn record(
    app_state: &AppState,
    locale: &Locale,
    actor: &Actor,
    kind: MovementKind,
    payload: MovementPayload,
) -> Result<(StatusCode, Json<MovementReceipt>), ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(locale))?;

    let receipt = app_state
        .inventory_service
        .record_movement(actor, payload.into_request(kind))
        .await
        .map_err(|e| e.to_api_error(locale))?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

// ---
// Handler: create_entry
// ---
#[utoipa::path(
    post,
    path = "/api/inventory/entries",
    tag = "Inventory",
    request_body = MovementPayload,
    responses(
        (status = 201, description = "Entrada registrada", body = MovementReceipt),
        (status = 400, description = "Quantidade ou campos inválidos"),
        (status = 404, description = "Produto ou fornecedor não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_entry(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermInventoryWrite>,
    body: Result<Json<MovementPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(body, &locale)?;
    record(&app_state, &locale, &actor, MovementKind::Entry, payload).await
}

// ---
// Handler: create_exit
// ---
#[utoipa::path(
    post,
    path = "/api/inventory/exits",
    tag = "Inventory",
    request_body = MovementPayload,
    responses(
        (status = 201, description = "Saída registrada", body = MovementReceipt),
        (status = 400, description = "Quantidade ou campos inválidos"),
        (status = 404, description = "Produto ou cliente não encontrado"),
        (status = 409, description = "Estoque insuficiente")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_exit(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermInventoryWrite>,
    body: Result<Json<MovementPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(body, &locale)?;
    record(&app_state, &locale, &actor, MovementKind::Exit, payload).await
}

// ---
// Handler: list_movements
// ---
#[utoipa::path(
    get,
    path = "/api/inventory/movements",
    tag = "Inventory",
    params(MovementQuery),
    responses(
        (status = 200, description = "Movimentações, mais recentes primeiro", body = Page<MovementView>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_movements(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermInventoryRead>,
    query: Result<Query<MovementQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = MovementFilter::from(query_params(query, &locale)?);

    let page = app_state
        .inventory_service
        .list_movements(&actor, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(page))
}

// ---
// Handler: get_movement
// ---
#[utoipa::path(
    get,
    path = "/api/inventory/movements/{id}",
    tag = "Inventory",
    params(("id" = Uuid, Path, description = "ID da movimentação")),
    responses(
        (status = 200, description = "Movimentação", body = MovementView),
        (status = 404, description = "Movimentação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_movement(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermInventoryRead>,
    Path(movement_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let movement = app_state
        .inventory_service
        .get_movement(&actor, movement_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(movement))
}

// ---
// Handler: cancel_movement (admin)
// ---
#[utoipa::path(
    delete,
    path = "/api/inventory/movements/{id}",
    tag = "Inventory",
    params(("id" = Uuid, Path, description = "ID da movimentação")),
    responses(
        (status = 200, description = "Movimentação estornada", body = ReversalReceipt),
        (status = 403, description = "Somente administradores"),
        (status = 404, description = "Movimentação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_movement(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermInventoryCancel>,
    Path(movement_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = app_state
        .inventory_service
        .cancel_movement(&actor, movement_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(receipt))
}
