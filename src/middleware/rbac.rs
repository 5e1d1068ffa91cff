// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    common::error::{ApiError, AppError},
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::permissions,
};

/// 1. O Trait que define o que é uma Permissão
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// 2. O Extractor (Guardião)
pub struct RequirePermission<T>(pub PhantomData<T>);

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let locale = Locale::from_headers(&parts.headers);

        // A. Extrai Usuário (colocado pelo auth_guard)
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale))?;

        // B. Papel do token concede a permissão?
        let required_perm = T::slug();
        if !user.0.role.grants(required_perm) {
            tracing::debug!(user_id = %user.0.user_id, permission = required_perm, "Permissão negada");
            return Err(AppError::Forbidden(required_perm).to_api_error(&locale));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

pub struct PermInventoryRead;
impl PermissionDef for PermInventoryRead {
    fn slug() -> &'static str { permissions::INVENTORY_READ }
}

pub struct PermInventoryWrite;
impl PermissionDef for PermInventoryWrite {
    fn slug() -> &'static str { permissions::INVENTORY_WRITE }
}

pub struct PermInventoryCancel;
impl PermissionDef for PermInventoryCancel {
    fn slug() -> &'static str { permissions::INVENTORY_CANCEL }
}

pub struct PermCatalogRead;
impl PermissionDef for PermCatalogRead {
    fn slug() -> &'static str { permissions::CATALOG_READ }
}

pub struct PermCatalogWrite;
impl PermissionDef for PermCatalogWrite {
    fn slug() -> &'static str { permissions::CATALOG_WRITE }
}

pub struct PermHistoryRead;
impl PermissionDef for PermHistoryRead {
    fn slug() -> &'static str { permissions::HISTORY_READ }
}

pub struct PermCounterpartiesRead;
impl PermissionDef for PermCounterpartiesRead {
    fn slug() -> &'static str { permissions::COUNTERPARTIES_READ }
}

pub struct PermCounterpartiesWrite;
impl PermissionDef for PermCounterpartiesWrite {
    fn slug() -> &'static str { permissions::COUNTERPARTIES_WRITE }
}

pub struct PermDashboardRead;
impl PermissionDef for PermDashboardRead {
    fn slug() -> &'static str { permissions::DASHBOARD_READ }
}

pub struct PermUsersManage;
impl PermissionDef for PermUsersManage {
    fn slug() -> &'static str { permissions::USERS_MANAGE }
}
