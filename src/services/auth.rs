// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    common::error::AppError,
    db::UserStore,
    models::auth::{
        permissions, Actor, AuthResponse, Claims, CreateUserPayload, LoginPayload, NewTenant,
        NewUser, RegisterPayload, Role, User, UserProfile,
    },
};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt_secret: String,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, jwt_secret: String, token_ttl: Duration) -> Self {
        Self {
            users,
            jwt_secret,
            token_ttl,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Custo do bcrypt (os testes usam o mínimo).
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_owned();
        let cost = self.bcrypt_cost;
        // Hashing fora do runtime assíncrono
        let hashed = tokio::task::spawn_blocking(move || hash(&password, cost))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
        Ok(hashed)
    }

    async fn profile_of(&self, user: &User) -> Result<UserProfile, AppError> {
        let tenant = self
            .users
            .find_tenant(user.tenant_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("usuário {} sem empresa", user.id))?;
        Ok(UserProfile::new(user, &tenant.name))
    }

    // --- CADASTRO (empresa + administrador) ---
    pub async fn register(&self, payload: RegisterPayload) -> Result<AuthResponse, AppError> {
        let password_hash = self.hash_password(&payload.password).await?;

        let tenant = NewTenant {
            name: payload.company_name.trim().to_string(),
            email: normalize_email(&payload.company_email),
        };
        let admin = NewUser {
            name: payload.admin_name.trim().to_string(),
            email: normalize_email(&payload.admin_email),
            password_hash,
            role: Role::Admin,
        };
        let (tenant, user) = self.users.register_tenant(&tenant, &admin).await?;

        tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "Empresa cadastrada");

        Ok(AuthResponse {
            token: self.issue_token(&user.actor())?,
            user: UserProfile::new(&user, &tenant.name),
        })
    }

    pub async fn login(&self, payload: LoginPayload) -> Result<AuthResponse, AppError> {
        let user = self
            .users
            .find_by_email(&normalize_email(&payload.email))
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password = payload.password;
        let password_hash = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || verify(&password, &password_hash))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        let tenant = self
            .users
            .find_tenant(user.tenant_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        if !user.active || !tenant.active {
            return Err(AppError::AccountDisabled);
        }

        self.users.touch_last_login(user.id).await?;
        tracing::info!(tenant_id = %user.tenant_id, user_id = %user.id, "Login");

        Ok(AuthResponse {
            token: self.issue_token(&user.actor())?,
            user: UserProfile::new(&user, &tenant.name),
        })
    }

    pub async fn me(&self, actor: &Actor) -> Result<UserProfile, AppError> {
        let user = self
            .users
            .find_by_id(actor.user_id)
            .await?
            .filter(|u| u.tenant_id == actor.tenant_id)
            .ok_or(AppError::UserNotFound)?;
        self.profile_of(&user).await
    }

    /// Administrador cria um usuário na própria empresa (funcionário por padrão).
    pub async fn create_user(&self, actor: &Actor, payload: CreateUserPayload) -> Result<UserProfile, AppError> {
        actor.require(permissions::USERS_MANAGE)?;

        let password_hash = self.hash_password(&payload.password).await?;
        let user = self
            .users
            .create_user(
                actor.tenant_id,
                &NewUser {
                    name: payload.name.trim().to_string(),
                    email: normalize_email(&payload.email),
                    password_hash,
                    role: payload.role.unwrap_or(Role::Employee),
                },
            )
            .await?;

        tracing::info!(tenant_id = %actor.tenant_id, user_id = %user.id, "Usuário criado");
        self.profile_of(&user).await
    }

    // ---
    // Tokens
    // ---

    pub fn issue_token(&self, actor: &Actor) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;

        let claims = Claims {
            sub: actor.user_id,
            tenant_id: actor.tenant_id,
            role: actor.role,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }

    /// Token sem estado: as claims bastam, sem consulta ao banco por requisição.
    pub fn validate_token(&self, token: &str) -> Result<Actor, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })?;
        Ok(token_data.claims.actor())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::db::MemoryUserStore;

    fn service(store: &MemoryUserStore) -> AuthService {
        AuthService::new(Arc::new(store.clone()), "test-secret".into(), Duration::hours(24))
            .with_bcrypt_cost(4)
    }

    fn register_payload(email: &str) -> RegisterPayload {
        RegisterPayload {
            company_name: "Boutique Awa".into(),
            company_email: format!("contact+{email}"),
            admin_name: "Awa".into(),
            admin_email: email.into(),
            password: "motdepasse".into(),
        }
    }

    #[tokio::test]
    async fn register_then_login_round_trip() {
        let store = MemoryUserStore::new();
        let auth = service(&store);

        let registered = auth.register(register_payload("Awa@Example.com")).await.unwrap();
        assert_eq!(registered.user.role, Role::Admin);
        assert_eq!(registered.user.email, "awa@example.com");
        assert_eq!(registered.user.tenant_name, "Boutique Awa");

        let logged = auth
            .login(LoginPayload {
                email: "awa@example.com".into(),
                password: "motdepasse".into(),
            })
            .await
            .unwrap();
        let actor = auth.validate_token(&logged.token).unwrap();
        assert_eq!(actor.user_id, registered.user.id);
        assert_eq!(actor.tenant_id, registered.user.tenant_id);
        assert_eq!(actor.role, Role::Admin);

        let me = auth.me(&actor).await.unwrap();
        assert_eq!(me.tenant_name, "Boutique Awa");
    }

    #[tokio::test]
    async fn wrong_password_and_duplicate_email_are_rejected() {
        let store = MemoryUserStore::new();
        let auth = service(&store);
        auth.register(register_payload("moussa@example.com")).await.unwrap();

        let err = auth
            .login(LoginPayload {
                email: "moussa@example.com".into(),
                password: "errado".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));

        let err = auth.register(register_payload("moussa@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::EmailAlreadyExists));
    }

    #[tokio::test]
    async fn disabled_user_cannot_log_in() {
        let store = MemoryUserStore::new();
        let auth = service(&store);
        let registered = auth.register(register_payload("fatou@example.com")).await.unwrap();
        store.deactivate_user(registered.user.id).unwrap();

        let err = auth
            .login(LoginPayload {
                email: "fatou@example.com".into(),
                password: "motdepasse".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccountDisabled));
    }

    #[tokio::test]
    async fn only_admins_create_users_in_their_own_tenant() {
        let store = MemoryUserStore::new();
        let auth = service(&store);
        let registered = auth.register(register_payload("chef@example.com")).await.unwrap();
        let admin = auth.validate_token(&registered.token).unwrap();

        let employee = auth
            .create_user(
                &admin,
                CreateUserPayload {
                    name: "Ibrahim".into(),
                    email: "ibrahim@example.com".into(),
                    password: "12345678".into(),
                    role: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(employee.role, Role::Employee);
        assert_eq!(employee.tenant_id, admin.tenant_id);

        let as_employee = Actor {
            user_id: employee.id,
            tenant_id: employee.tenant_id,
            role: Role::Employee,
        };
        let err = auth
            .create_user(
                &as_employee,
                CreateUserPayload {
                    name: "Autre".into(),
                    email: "autre@example.com".into(),
                    password: "12345678".into(),
                    role: Some(Role::Admin),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(permissions::USERS_MANAGE)));
    }

    #[test]
    fn tampered_and_expired_tokens_are_distinguished() {
        let store = MemoryUserStore::new();
        let auth = service(&store);
        let actor = Actor {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: Role::Employee,
        };

        let token = auth.issue_token(&actor).unwrap();
        assert_eq!(auth.validate_token(&token).unwrap(), actor);

        let other = AuthService::new(Arc::new(store.clone()), "other-secret".into(), Duration::hours(1));
        assert!(matches!(other.validate_token(&token), Err(AppError::InvalidToken)));
        assert!(matches!(auth.validate_token("not-a-jwt"), Err(AppError::InvalidToken)));

        let expired = AuthService::new(Arc::new(store), "test-secret".into(), Duration::hours(-1));
        let token = expired.issue_token(&actor).unwrap();
        assert!(matches!(auth.validate_token(&token), Err(AppError::TokenExpired)));
    }
}
