// src/handlers/auth.rs

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    handlers::json_body,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermUsersManage, RequirePermission},
    },
    models::auth::{AuthResponse, CreateUserPayload, LoginPayload, RegisterPayload, UserProfile},
};

// Handler de registro (empresa + administrador)
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Empresa criada", body = AuthResponse),
        (status = 409, description = "E-mail já cadastrado")
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    locale: Locale,
    body: Result<Json<RegisterPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(body, &locale)?;
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let response = app_state
        .auth_service
        .register(payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(response)))
}

// Handler de login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Autenticado", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas"),
        (status = 403, description = "Conta desativada")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    locale: Locale,
    body: Result<Json<LoginPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(body, &locale)?;
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let response = app_state
        .auth_service
        .login(payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(response))
}

// Handler da rota protegida /me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Perfil do usuário", body = UserProfile)),
    security(("api_jwt" = []))
)]
pub async fn get_me(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let profile = app_state
        .auth_service
        .me(&actor)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(profile))
}

// Administrador cria usuário na própria empresa
#[utoipa::path(
    post,
    path = "/api/auth/users",
    tag = "Auth",
    request_body = CreateUserPayload,
    responses(
        (status = 201, description = "Usuário criado", body = UserProfile),
        (status = 403, description = "Somente administradores"),
        (status = 409, description = "E-mail já cadastrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_user(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermUsersManage>,
    body: Result<Json<CreateUserPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(body, &locale)?;
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let profile = app_state
        .auth_service
        .create_user(&actor, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(profile)))
}
