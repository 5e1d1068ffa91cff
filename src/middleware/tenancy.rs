// src/middleware/tenancy.rs

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    middleware::i18n::Locale,
    models::auth::Actor,
};

// O nome do nosso cabeçalho HTTP customizado
const TENANT_ID_HEADER: &str = "x-tenant-id";

// Empresa da requisição. Sempre a do token; o cabeçalho X-Tenant-ID é opcional
// e, quando enviado, precisa coincidir.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub Uuid);

impl TenantContext {
    pub fn resolve(headers: &HeaderMap, actor: &Actor) -> Result<Self, AppError> {
        let Some(value) = headers.get(TENANT_ID_HEADER) else {
            return Ok(TenantContext(actor.tenant_id));
        };

        let requested = value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or(AppError::TenantMismatch)?;

        if requested != actor.tenant_id {
            tracing::warn!(
                user_id = %actor.user_id,
                token_tenant = %actor.tenant_id,
                requested_tenant = %requested,
                "Acesso a outra empresa recusado"
            );
            return Err(AppError::TenantMismatch);
        }
        Ok(TenantContext(requested))
    }
}

// Inserido pelo `auth_guard`
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .copied()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&Locale::from_headers(&parts.headers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Role;
    use axum::http::HeaderValue;

    fn actor() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: Role::Employee,
        }
    }

    #[test]
    fn missing_header_uses_the_token_tenant() {
        let actor = actor();
        let ctx = TenantContext::resolve(&HeaderMap::new(), &actor).unwrap();
        assert_eq!(ctx.0, actor.tenant_id);
    }

    #[test]
    fn header_must_match_the_token_tenant() {
        let actor = actor();
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_ID_HEADER, HeaderValue::from_str(&actor.tenant_id.to_string()).unwrap());
        assert!(TenantContext::resolve(&headers, &actor).is_ok());

        headers.insert(TENANT_ID_HEADER, HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());
        assert!(matches!(TenantContext::resolve(&headers, &actor), Err(AppError::TenantMismatch)));

        headers.insert(TENANT_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(TenantContext::resolve(&headers, &actor), Err(AppError::TenantMismatch)));
    }
}
