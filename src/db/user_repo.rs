// src/db/user_repo.rs

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::is_unique_violation, error::AppError},
    db::store::UserStore,
    models::auth::{NewTenant, NewUser, Tenant, User},
};

// O repositório de usuários, responsável pelas tabelas 'tenants' e 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_user<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user: &NewUser,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, tenant_id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            // "users_email_key": UNIQUE global do e-mail
            if is_unique_violation(&e) {
                return AppError::EmailAlreadyExists;
            }
            e.into()
        })
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn register_tenant(
        &self,
        tenant: &NewTenant,
        admin: &NewUser,
    ) -> Result<(Tenant, User), AppError> {
        // --- INÍCIO DA TRANSAÇÃO ---
        let mut tx = self.pool.begin().await?;

        // 1. Cria a empresa
        let created = sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (id, name, email) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&tenant.name)
        .bind(&tenant.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::EmailAlreadyExists;
            }
            AppError::from(e)
        })?;

        // 2. Cria o administrador. Se falhar, a empresa acima é desfeita no drop.
        let user = Self::insert_user(&mut *tx, created.id, admin).await?;

        tx.commit().await?;
        // --- FIM DA TRANSAÇÃO ---

        Ok((created, user))
    }

    async fn create_user(&self, tenant_id: Uuid, user: &NewUser) -> Result<User, AppError> {
        Self::insert_user(&self.pool, tenant_id, user).await
    }

    async fn touch_last_login(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
