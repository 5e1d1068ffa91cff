use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::common::error::AppError;

// ---
// Helper RLS: A "Chave" para o Banco de Dados
// ---
/// Abre uma transação e define as variáveis RLS (a "chave") só para ela.
/// O `Drop` da transação faz rollback se ela não chegar ao commit.
pub(crate) async fn begin_tenant_tx(
    pool: &PgPool,
    tenant_id: Uuid,
    user_id: Option<Uuid>,
) -> Result<Transaction<'static, Postgres>, AppError> {
    // 1. Adquire conexão + BEGIN
    // O operador '?' converte automaticamente sqlx::Error -> AppError::DatabaseError
    let mut tx = pool.begin().await?;

    // 2. Define Tenant ID (local à transação)
    sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
        .bind(tenant_id.to_string())
        .execute(&mut *tx)
        .await?;

    // 3. Define User ID
    if let Some(user_id) = user_id {
        sqlx::query("SELECT set_config('app.user_id', $1, true)")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;
    }

    Ok(tx)
}

/// `true` se o erro for violação de UNIQUE.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
