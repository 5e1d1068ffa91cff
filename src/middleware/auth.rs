// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeaderRejection,
    TypedHeader,
};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{i18n::Locale, tenancy::TenantContext},
    models::auth::Actor,
};

// O middleware em si: valida o Bearer, resolve a empresa e guarda ambos nas extensions
pub async fn auth_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Cabeçalho ausente ou malformado: mesmo tratamento de token inválido
    let TypedHeader(Authorization(bearer)) =
        bearer.map_err(|_| AppError::InvalidToken.to_api_error(&locale))?;

    let actor = app_state
        .auth_service
        .validate_token(bearer.token())
        .map_err(|e| e.to_api_error(&locale))?;

    let tenant = TenantContext::resolve(request.headers(), &actor)
        .map_err(|e| e.to_api_error(&locale))?;

    // Insere o usuário e a empresa nos "extensions" da requisição
    request.extensions_mut().insert(AuthenticatedUser(actor));
    request.extensions_mut().insert(tenant);
    Ok(next.run(request).await)
}

// Extrator para obter o usuário autenticado diretamente nos handlers
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Actor);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&Locale::from_headers(&parts.headers)))
    }
}
