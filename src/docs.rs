// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::get_me,
        handlers::auth::create_user,

        // --- Products ---
        handlers::products::list_products,
        handlers::products::create_product,
        handlers::products::get_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::products::list_categories,
        handlers::products::create_category,

        // --- Inventory ---
        handlers::inventory::create_entry,
        handlers::inventory::create_exit,
        handlers::inventory::list_movements,
        handlers::inventory::get_movement,
        handlers::inventory::cancel_movement,

        // --- Suppliers / Clients ---
        handlers::counterparties::list_suppliers,
        handlers::counterparties::create_supplier,
        handlers::counterparties::get_supplier,
        handlers::counterparties::update_supplier,
        handlers::counterparties::delete_supplier,
        handlers::counterparties::list_clients,
        handlers::counterparties::create_client,
        handlers::counterparties::get_client,
        handlers::counterparties::update_client,
        handlers::counterparties::delete_client,

        // --- Dashboard ---
        handlers::dashboard::get_stats,
        handlers::dashboard::get_chart,

        // --- History ---
        handlers::history::list_history,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::UserProfile,
            models::auth::RegisterPayload,
            models::auth::LoginPayload,
            models::auth::CreateUserPayload,
            models::auth::AuthResponse,

            // --- Inventory ---
            models::inventory::Product,
            models::inventory::MovementKind,
            models::inventory::StockMovement,
            models::inventory::MovementView,
            models::inventory::Category,
            models::inventory::ProductSort,
            models::inventory::SortDirection,
            models::inventory::MovementReceipt,
            models::inventory::ReversalReceipt,

            // --- Suppliers / Clients ---
            models::counterparty::CounterpartyKind,
            models::counterparty::Counterparty,

            // --- Dashboard ---
            models::dashboard::DashboardStats,
            models::dashboard::DailyTotals,
            models::dashboard::LowStockItem,

            // --- History ---
            models::audit::AuditAction,
            models::audit::AuditEntry,

            // --- Payloads ---
            handlers::inventory::MovementPayload,
            handlers::products::CreateProductPayload,
            handlers::products::UpdateProductPayload,
            handlers::products::CreateCategoryPayload,
            handlers::counterparties::CounterpartyPayload,
            handlers::counterparties::UpdateCounterpartyPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação, Registro e Usuários"),
        (name = "Products", description = "Catálogo de Produtos"),
        (name = "Inventory", description = "Entradas, Saídas e Estornos de Estoque"),
        (name = "Suppliers", description = "Fornecedores"),
        (name = "Clients", description = "Clientes"),
        (name = "Dashboard", description = "Painel: estoque e movimento por dia"),
        (name = "History", description = "Histórico de Ações")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}
