use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::middleware::i18n::Locale;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Quantidade inválida")]
    InvalidQuantity,

    #[error("Produto não encontrado")]
    ProductNotFound,

    #[error("Movimentação não encontrada")]
    MovementNotFound,

    #[error("Estoque insuficiente (disponível: {available}, pedido: {requested})")]
    InsufficientStock { available: i32, requested: i32 },

    #[error("Já existe um produto com o nome '{0}'")]
    ProductNameAlreadyExists(String),

    #[error("Fornecedor ou cliente não encontrado")]
    CounterpartyNotFound,

    #[error("Categoria não encontrada")]
    CategoryNotFound,

    #[error("Já existe uma categoria com o nome '{0}'")]
    CategoryNameAlreadyExists(String),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Token expirado")]
    TokenExpired,

    #[error("Conta desativada")]
    AccountDisabled,

    #[error("Permissão '{0}' necessária")]
    Forbidden(&'static str),

    #[error("Empresa do pedido difere da empresa do token")]
    TenantMismatch,

    #[error("Usuário não encontrado")]
    UserNotFound,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    /// Conflito de serialização, deadlock ou pool esgotado: o cliente pode repetir a operação.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::DatabaseError(sqlx::Error::PoolTimedOut) => true,
            AppError::DatabaseError(sqlx::Error::Database(db_err)) => {
                matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidQuantity => StatusCode::BAD_REQUEST,
            AppError::ProductNotFound
            | AppError::MovementNotFound
            | AppError::CounterpartyNotFound
            | AppError::CategoryNotFound
            | AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::InsufficientStock { .. }
            | AppError::ProductNameAlreadyExists(_)
            | AppError::CategoryNameAlreadyExists(_)
            | AppError::EmailAlreadyExists => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::InvalidToken | AppError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AppError::AccountDisabled | AppError::Forbidden(_) | AppError::TenantMismatch => {
                StatusCode::FORBIDDEN
            }
            e if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Código estável, seguro para o frontend comparar.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidQuantity => "INVALID_QUANTITY",
            AppError::ProductNotFound => "PRODUCT_NOT_FOUND",
            AppError::MovementNotFound => "MOVEMENT_NOT_FOUND",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::ProductNameAlreadyExists(_) => "PRODUCT_NAME_EXISTS",
            AppError::CounterpartyNotFound => "COUNTERPARTY_NOT_FOUND",
            AppError::CategoryNotFound => "CATEGORY_NOT_FOUND",
            AppError::CategoryNameAlreadyExists(_) => "CATEGORY_NAME_EXISTS",
            AppError::EmailAlreadyExists => "EMAIL_EXISTS",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::AccountDisabled => "ACCOUNT_DISABLED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::TenantMismatch => "TENANT_MISMATCH",
            AppError::UserNotFound => "USER_NOT_FOUND",
            e if e.is_transient() => "TRANSIENT",
            _ => "INTERNAL_ERROR",
        }
    }

    fn message(&self, lang: &str) -> String {
        match (self, lang) {
            (AppError::ValidationError(_), "pt") => "Um ou mais campos são inválidos.".into(),
            (AppError::ValidationError(_), "fr") => "Un ou plusieurs champs sont invalides.".into(),
            (AppError::ValidationError(_), _) => "One or more fields are invalid.".into(),

            (AppError::InvalidQuantity, "pt") => "A quantidade deve ser um inteiro maior ou igual a 1.".into(),
            (AppError::InvalidQuantity, "fr") => "La quantité doit être un entier supérieur ou égal à 1.".into(),
            (AppError::InvalidQuantity, _) => "Quantity must be an integer greater than or equal to 1.".into(),

            (AppError::ProductNotFound, "pt") => "Produto não encontrado.".into(),
            (AppError::ProductNotFound, "fr") => "Produit non trouvé.".into(),
            (AppError::ProductNotFound, _) => "Product not found.".into(),

            (AppError::MovementNotFound, "pt") => "Movimentação não encontrada.".into(),
            (AppError::MovementNotFound, "fr") => "Mouvement non trouvé.".into(),
            (AppError::MovementNotFound, _) => "Movement not found.".into(),

            (AppError::InsufficientStock { available, requested }, "pt") => {
                format!("Estoque insuficiente. Disponível: {available}, pedido: {requested}.")
            }
            (AppError::InsufficientStock { available, requested }, "fr") => {
                format!("Stock insuffisant. Disponible: {available}, demandé: {requested}.")
            }
            (AppError::InsufficientStock { available, requested }, _) => {
                format!("Insufficient stock. Available: {available}, requested: {requested}.")
            }

            (AppError::ProductNameAlreadyExists(name), "pt") => format!("Já existe um produto chamado '{name}'."),
            (AppError::ProductNameAlreadyExists(name), "fr") => format!("Un produit nommé '{name}' existe déjà."),
            (AppError::ProductNameAlreadyExists(name), _) => format!("A product named '{name}' already exists."),

            (AppError::CounterpartyNotFound, "pt") => "Fornecedor ou cliente não encontrado.".into(),
            (AppError::CounterpartyNotFound, "fr") => "Fournisseur ou client non trouvé.".into(),
            (AppError::CounterpartyNotFound, _) => "Supplier or client not found.".into(),

            (AppError::CategoryNotFound, "pt") => "Categoria não encontrada.".into(),
            (AppError::CategoryNotFound, "fr") => "Catégorie non trouvée.".into(),
            (AppError::CategoryNotFound, _) => "Category not found.".into(),

            (AppError::CategoryNameAlreadyExists(name), "pt") => format!("Já existe uma categoria chamada '{name}'."),
            (AppError::CategoryNameAlreadyExists(name), "fr") => format!("Une catégorie nommée '{name}' existe déjà."),
            (AppError::CategoryNameAlreadyExists(name), _) => format!("A category named '{name}' already exists."),

            (AppError::EmailAlreadyExists, "pt") => "Este e-mail já está em uso.".into(),
            (AppError::EmailAlreadyExists, "fr") => "Cet email est déjà utilisé.".into(),
            (AppError::EmailAlreadyExists, _) => "This e-mail is already in use.".into(),

            (AppError::InvalidCredentials, "pt") => "E-mail ou senha inválidos.".into(),
            (AppError::InvalidCredentials, "fr") => "Email ou mot de passe incorrect.".into(),
            (AppError::InvalidCredentials, _) => "Invalid e-mail or password.".into(),

            (AppError::InvalidToken, "pt") => "Token de autenticação inválido ou ausente.".into(),
            (AppError::InvalidToken, "fr") => "Token d'authentification invalide ou manquant.".into(),
            (AppError::InvalidToken, _) => "Missing or invalid authentication token.".into(),

            (AppError::TokenExpired, "pt") => "Token expirado, faça login novamente.".into(),
            (AppError::TokenExpired, "fr") => "Token expiré, veuillez vous reconnecter.".into(),
            (AppError::TokenExpired, _) => "Token expired, please sign in again.".into(),

            (AppError::AccountDisabled, "pt") => "Conta desativada.".into(),
            (AppError::AccountDisabled, "fr") => "Compte désactivé.".into(),
            (AppError::AccountDisabled, _) => "Account disabled.".into(),

            (AppError::Forbidden(perm), "pt") => format!("Você precisa da permissão '{perm}' para realizar esta ação."),
            (AppError::Forbidden(perm), "fr") => format!("La permission '{perm}' est requise pour cette action."),
            (AppError::Forbidden(perm), _) => format!("Permission '{perm}' is required for this action."),

            (AppError::TenantMismatch, "pt") => "Acesso aos dados de outra empresa recusado.".into(),
            (AppError::TenantMismatch, "fr") => "Accès aux données d'une autre entreprise refusé.".into(),
            (AppError::TenantMismatch, _) => "Access to another company's data is denied.".into(),

            (AppError::UserNotFound, "pt") => "Usuário não encontrado.".into(),
            (AppError::UserNotFound, "fr") => "Utilisateur non trouvé.".into(),
            (AppError::UserNotFound, _) => "User not found.".into(),

            (e, "pt") if e.is_transient() => "Serviço temporariamente indisponível, tente novamente.".into(),
            (e, "fr") if e.is_transient() => "Service temporairement indisponible, réessayez.".into(),
            (e, _) if e.is_transient() => "Service temporarily unavailable, please retry.".into(),

            (_, "pt") => "Ocorreu um erro inesperado.".into(),
            (_, "fr") => "Erreur serveur.".into(),
            (_, _) => "An unexpected error occurred.".into(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                Some(json!(details))
            }
            AppError::InsufficientStock { available, requested } => {
                Some(json!({ "available": available, "requested": requested }))
            }
            _ => None,
        }
    }

    /// Converte para a resposta HTTP no idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale) -> ApiError {
        let status = self.status();
        if status.is_server_error() {
            // O `tracing` loga a mensagem detalhada que `thiserror` nos deu.
            tracing::error!(code = self.code(), "Erro Interno do Servidor: {}", self);
        }
        ApiError {
            status,
            code: self.code(),
            error: self.message(&locale.0),
            details: self.details(),
        }
    }
}

// Rejeição/resposta HTTP de erro.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub error: String,
    pub details: Option<Value>,
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        err.to_api_error(&Locale::default())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "code": self.code,
            "error": self.error,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}
