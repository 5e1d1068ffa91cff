// src/config.rs

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        AuditRepository, CounterpartyRepository, DashboardRepository, InventoryRepository,
        UserRepository,
    },
    services::{
        AuditService, AuthService, CounterpartyService, DashboardService, InventoryService,
    },
};

// Configuração lida do ambiente (.env em desenvolvimento)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub request_timeout: Duration,
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} inválida ({raw}): {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?,
            jwt_ttl_hours: var_or("JWT_TTL_HOURS", 24)?,
            bind_addr: var_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            db_max_connections: var_or("DB_MAX_CONNECTIONS", 5)?,
            request_timeout: Duration::from_secs(var_or("REQUEST_TIMEOUT_SECS", 30)?),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub inventory_service: InventoryService,
    pub counterparty_service: CounterpartyService,
    pub dashboard_service: DashboardService,
    pub audit_service: AuditService,
    pub request_timeout: Duration,
}

impl AppState {
    /// Monta o estado sobre o Postgres. Devolve também o pool, para as migrações.
    pub async fn new(config: &Config) -> anyhow::Result<(Self, PgPool)> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let audit_service = AuditService::new(Arc::new(AuditRepository::new(db_pool.clone())));
        let inventory_service = InventoryService::new(
            Arc::new(InventoryRepository::new(db_pool.clone())),
            audit_service.clone(),
        );
        let counterparty_service = CounterpartyService::new(
            Arc::new(CounterpartyRepository::new(db_pool.clone())),
            audit_service.clone(),
        );
        let dashboard_service = DashboardService::new(Arc::new(DashboardRepository::new(db_pool.clone())));
        let auth_service = AuthService::new(
            Arc::new(UserRepository::new(db_pool.clone())),
            config.jwt_secret.clone(),
            chrono::Duration::hours(config.jwt_ttl_hours),
        );

        Ok((
            Self::from_parts(
                auth_service,
                inventory_service,
                counterparty_service,
                dashboard_service,
                audit_service,
                config.request_timeout,
            ),
            db_pool,
        ))
    }

    /// Estado a partir de serviços já montados (ex.: sobre os stores em memória).
    pub fn from_parts(
        auth_service: AuthService,
        inventory_service: InventoryService,
        counterparty_service: CounterpartyService,
        dashboard_service: DashboardService,
        audit_service: AuditService,
        request_timeout: Duration,
    ) -> Self {
        Self {
            auth_service,
            inventory_service,
            counterparty_service,
            dashboard_service,
            audit_service,
            request_timeout,
        }
    }
}
