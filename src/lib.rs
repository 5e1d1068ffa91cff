//! Backend de controle de estoque multiempresa: catálogo, livro-razão de
//! movimentações (entradas, saídas, estornos), fornecedores e clientes,
//! painel e histórico de ações.

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use crate::{config::AppState, docs::ApiDoc, middleware::auth::auth_guard};

/// Monta o router completo sobre um `AppState` já pronto.
pub fn build_router(app_state: AppState) -> Router {
    // Daqui para baixo tudo passa pelo auth_guard (token + empresa)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route("/users", post(handlers::auth::create_user));

    let product_routes = Router::new()
        .route(
            "/",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/categories",
            get(handlers::products::list_categories).post(handlers::products::create_category),
        )
        .route(
            "/{id}",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        );

    let inventory_routes = Router::new()
        .route("/entries", post(handlers::inventory::create_entry))
        .route("/exits", post(handlers::inventory::create_exit))
        .route("/movements", get(handlers::inventory::list_movements))
        .route(
            "/movements/{id}",
            get(handlers::inventory::get_movement).delete(handlers::inventory::cancel_movement),
        );

    let supplier_routes = Router::new()
        .route(
            "/",
            get(handlers::counterparties::list_suppliers)
                .post(handlers::counterparties::create_supplier),
        )
        .route(
            "/{id}",
            get(handlers::counterparties::get_supplier)
                .put(handlers::counterparties::update_supplier)
                .delete(handlers::counterparties::delete_supplier),
        );

    let client_routes = Router::new()
        .route(
            "/",
            get(handlers::counterparties::list_clients).post(handlers::counterparties::create_client),
        )
        .route(
            "/{id}",
            get(handlers::counterparties::get_client)
                .put(handlers::counterparties::update_client)
                .delete(handlers::counterparties::delete_client),
        );

    let dashboard_routes = Router::new()
        .route("/stats", get(handlers::dashboard::get_stats))
        .route("/chart", get(handlers::dashboard::get_chart));

    let protected = Router::new()
        .nest("/api/auth", user_routes)
        .nest("/api/products", product_routes)
        .nest("/api/inventory", inventory_routes)
        .nest("/api/suppliers", supplier_routes)
        .nest("/api/clients", client_routes)
        .nest("/api/dashboard", dashboard_routes)
        .route("/api/history", get(handlers::history::list_history))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let request_timeout = app_state.request_timeout;

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        // Rotas de autenticação (públicas)
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
