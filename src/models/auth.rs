// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;

// Slugs das permissões verificadas pelos extratores e pelos serviços
pub mod permissions {
    pub const INVENTORY_READ: &str = "inventory:read";
    pub const INVENTORY_WRITE: &str = "inventory:write";
    pub const INVENTORY_CANCEL: &str = "inventory:cancel";
    pub const CATALOG_READ: &str = "catalog:read";
    pub const CATALOG_WRITE: &str = "catalog:write";
    pub const HISTORY_READ: &str = "history:read";
    pub const COUNTERPARTIES_READ: &str = "counterparties:read";
    pub const COUNTERPARTIES_WRITE: &str = "counterparties:write";
    pub const DASHBOARD_READ: &str = "dashboard:read";
    pub const USERS_MANAGE: &str = "users:manage";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    /// Admin tem tudo; funcionário lê e registra movimentações.
    pub fn grants(self, permission: &str) -> bool {
        use permissions::*;
        match self {
            Role::Admin => true,
            Role::Employee => matches!(
                permission,
                INVENTORY_READ
                    | INVENTORY_WRITE
                    | CATALOG_READ
                    | HISTORY_READ
                    | COUNTERPARTIES_READ
                    | DASHBOARD_READ
            ),
        }
    }
}

// Quem está chamando: resolvido a partir do token antes de qualquer operação.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn require(&self, permission: &'static str) -> Result<(), AppError> {
        if self.role.grants(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(permission))
        }
    }
}

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub email: String,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    #[schema(ignore)]
    pub password_hash: String,

    pub role: Role,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            tenant_id: self.tenant_id,
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// Linhas prontas para INSERT (senha já com hash, e-mail normalizado)
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

// Perfil devolvido ao frontend (usuário + nome da empresa)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub tenant_id: Uuid,
    pub tenant_name: String,
}

impl UserProfile {
    pub fn new(user: &User, tenant_name: &str) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            tenant_id: user.tenant_id,
            tenant_name: tenant_name.to_string(),
        }
    }
}

// Cria a empresa e o seu primeiro administrador
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    #[validate(length(min = 1, message = "Company name is required."))]
    pub company_name: String,
    #[validate(email(message = "Company e-mail is invalid."))]
    pub company_email: String,
    #[validate(length(min = 1, message = "Administrator name is required."))]
    pub admin_name: String,
    #[validate(email(message = "Administrator e-mail is invalid."))]
    pub admin_email: String,
    #[validate(length(min = 8, message = "Password must have at least 8 characters."))]
    pub password: String,
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginPayload {
    #[validate(email(message = "E-mail is invalid."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

// Administrador cria um funcionário (ou outro administrador)
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[validate(length(min = 1, message = "Name is required."))]
    pub name: String,
    #[validate(email(message = "E-mail is invalid."))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must have at least 8 characters."))]
    pub password: String,
    pub role: Option<Role>,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: Uuid,       // Subject (ID do usuário)
    pub tenant_id: Uuid, // Empresa do usuário
    pub role: Role,
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}

impl Claims {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.sub,
            tenant_id: self.tenant_id,
            role: self.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employee_cannot_cancel_or_manage_catalog() {
        let employee = Actor {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: Role::Employee,
        };
        assert!(employee.require(permissions::INVENTORY_WRITE).is_ok());
        assert!(employee.require(permissions::HISTORY_READ).is_ok());
        assert!(matches!(
            employee.require(permissions::INVENTORY_CANCEL),
            Err(AppError::Forbidden("inventory:cancel"))
        ));
        assert!(!Role::Employee.grants(permissions::CATALOG_WRITE));
        assert!(!Role::Employee.grants(permissions::USERS_MANAGE));
        assert!(Role::Admin.grants(permissions::USERS_MANAGE));
    }

    #[test]
    fn employee_reads_partners_and_dashboard_but_cannot_edit_partners() {
        assert!(Role::Employee.grants(permissions::COUNTERPARTIES_READ));
        assert!(Role::Employee.grants(permissions::DASHBOARD_READ));
        assert!(!Role::Employee.grants(permissions::COUNTERPARTIES_WRITE));
        assert!(Role::Admin.grants(permissions::COUNTERPARTIES_WRITE));
    }
}
