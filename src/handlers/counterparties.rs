// src/handlers/counterparties.rs
//
// Fornecedores (/api/suppliers) e clientes (/api/clients): mesmas regras,
// o tipo vem da rota.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
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
        rbac::{PermCounterpartiesRead, PermCounterpartiesWrite, RequirePermission},
    },
    models::{
        auth::Actor,
        counterparty::{
            Counterparty, CounterpartyFilter, CounterpartyKind, CounterpartyPatch, NewCounterparty,
        },
    },
};

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartyPayload {
    #[validate(length(min = 1, max = 200, message = "Name is required."))]
    pub name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid e-mail."))]
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCounterpartyPayload {
    #[validate(length(min = 1, max = 200, message = "Name is required."))]
    pub name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid e-mail."))]
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CounterpartyQuery {
    /// Nome, telefone ou e-mail (contém)
    pub search: Option<String>,
    #[serde(default = "pagination::default_page")]
    pub page: u32,
    #[serde(default = "pagination::default_limit")]
    pub limit: u32,
}

// ---
// Passos comuns aos dois tipos
// ---
async fn list(
    app_state: &AppState,
    locale: &Locale,
    actor: &Actor,
    kind: CounterpartyKind,
    query: Result<Query<CounterpartyQuery>, QueryRejection>,
) -> Result<Json<Page<Counterparty>>, ApiError> {
    let q = query_params(query, locale)?;
    let filter = CounterpartyFilter {
        search: q.search,
        page: q.page,
        limit: q.limit,
    };
    let page = app_state
        .counterparty_service
        .list(actor, kind, &filter)
        .await
        .map_err(|e| e.to_api_error(locale))?;
    Ok(Json(page))
}

async fn get(
    app_state: &AppState,
    locale: &Locale,
    actor: &Actor,
    kind: CounterpartyKind,
    id: Uuid,
) -> Result<Json<Counterparty>, ApiError> {
    let row = app_state
        .counterparty_service
        .get(actor, kind, id)
        .await
        .map_err(|e| e.to_api_error(locale))?;
    Ok(Json(row))
}

async fn create(
    app_state: &AppState,
    locale: &Locale,
    actor: &Actor,
    kind: CounterpartyKind,
    body: Result<Json<CounterpartyPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Counterparty>), ApiError> {
    let payload = json_body(body, locale)?;
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(locale))?;

    let created = app_state
        .counterparty_service
        .create(
            actor,
            kind,
            NewCounterparty {
                name: payload.name,
                phone: payload.phone,
                email: payload.email,
                address: payload.address,
            },
        )
        .await
        .map_err(|e| e.to_api_error(locale))?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    app_state: &AppState,
    locale: &Locale,
    actor: &Actor,
    kind: CounterpartyKind,
    id: Uuid,
    body: Result<Json<UpdateCounterpartyPayload>, JsonRejection>,
) -> Result<Json<Counterparty>, ApiError> {
    let payload = json_body(body, locale)?;
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(locale))?;

    let patch = CounterpartyPatch {
        name: payload.name,
        phone: payload.phone,
        email: payload.email,
        address: payload.address,
    };
    let updated = app_state
        .counterparty_service
        .update(actor, kind, id, patch)
        .await
        .map_err(|e| e.to_api_error(locale))?;
    Ok(Json(updated))
}

async fn delete(
    app_state: &AppState,
    locale: &Locale,
    actor: &Actor,
    kind: CounterpartyKind,
    id: Uuid,
) -> Result<StatusCode, ApiError> {
    app_state
        .counterparty_service
        .deactivate(actor, kind, id)
        .await
        .map_err(|e| e.to_api_error(locale))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---
// Fornecedores
// ---
#[utoipa::path(
    get,
    path = "/api/suppliers",
    tag = "Suppliers",
    params(CounterpartyQuery),
    responses((status = 200, description = "Fornecedores ativos, por nome", body = Page<Counterparty>)),
    security(("api_jwt" = []))
)]
pub async fn list_suppliers(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCounterpartiesRead>,
    query: Result<Query<CounterpartyQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    list(&app_state, &locale, &actor, CounterpartyKind::Supplier, query).await
}

#[utoipa::path(
    post,
    path = "/api/suppliers",
    tag = "Suppliers",
    request_body = CounterpartyPayload,
    responses((status = 201, description = "Fornecedor criado", body = Counterparty)),
    security(("api_jwt" = []))
)]
pub async fn create_supplier(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCounterpartiesWrite>,
    body: Result<Json<CounterpartyPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    create(&app_state, &locale, &actor, CounterpartyKind::Supplier, body).await
}

#[utoipa::path(
    get,
    path = "/api/suppliers/{id}",
    tag = "Suppliers",
    params(("id" = Uuid, Path, description = "ID do fornecedor")),
    responses(
        (status = 200, description = "Fornecedor", body = Counterparty),
        (status = 404, description = "Fornecedor não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_supplier(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCounterpartiesRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    get(&app_state, &locale, &actor, CounterpartyKind::Supplier, id).await
}

#[utoipa::path(
    put,
    path = "/api/suppliers/{id}",
    tag = "Suppliers",
    params(("id" = Uuid, Path, description = "ID do fornecedor")),
    request_body = UpdateCounterpartyPayload,
    responses(
        (status = 200, description = "Fornecedor atualizado", body = Counterparty),
        (status = 404, description = "Fornecedor não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_supplier(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCounterpartiesWrite>,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateCounterpartyPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    update(&app_state, &locale, &actor, CounterpartyKind::Supplier, id, body).await
}

#[utoipa::path(
    delete,
    path = "/api/suppliers/{id}",
    tag = "Suppliers",
    params(("id" = Uuid, Path, description = "ID do fornecedor")),
    responses(
        (status = 204, description = "Fornecedor desativado"),
        (status = 404, description = "Fornecedor não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_supplier(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCounterpartiesWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    delete(&app_state, &locale, &actor, CounterpartyKind::Supplier, id).await
}

// ---
// Clientes
// ---
#[utoipa::path(
    get,
    path = "/api/clients",
    tag = "Clients",
    params(CounterpartyQuery),
    responses((status = 200, description = "Clientes ativos, por nome", body = Page<Counterparty>)),
    security(("api_jwt" = []))
)]
pub async fn list_clients(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCounterpartiesRead>,
    query: Result<Query<CounterpartyQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    list(&app_state, &locale, &actor, CounterpartyKind::Client, query).await
}

#[utoipa::path(
    post,
    path = "/api/clients",
    tag = "Clients",
    request_body = CounterpartyPayload,
    responses((status = 201, description = "Cliente criado", body = Counterparty)),
    security(("api_jwt" = []))
)]
pub async fn create_client(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCounterpartiesWrite>,
    body: Result<Json<CounterpartyPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    create(&app_state, &locale, &actor, CounterpartyKind::Client, body).await
}

#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente", body = Counterparty),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_client(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCounterpartiesRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    get(&app_state, &locale, &actor, CounterpartyKind::Client, id).await
}

#[utoipa::path(
    put,
    path = "/api/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    request_body = UpdateCounterpartyPayload,
    responses(
        (status = 200, description = "Cliente atualizado", body = Counterparty),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_client(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCounterpartiesWrite>,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateCounterpartyPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    update(&app_state, &locale, &actor, CounterpartyKind::Client, id, body).await
}

#[utoipa::path(
    delete,
    path = "/api/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 204, description = "Cliente desativado"),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_client(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCounterpartiesWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    delete(&app_state, &locale, &actor, CounterpartyKind::Client, id).await
}
