// src/handlers/products.rs

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::{
        error::{ApiError, AppError},
        pagination::{self, Page},
    },
    config::AppState,
    handlers::{json_body, query_params},
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermCatalogRead, PermCatalogWrite, RequirePermission},
    },
    models::inventory::{
        Category, NewCategory, NewProduct, Product, ProductFilter, ProductPatch, ProductSort,
        SortDirection,
    },
};

const DEFAULT_UNIT: &str = "unit";
const DEFAULT_MIN_STOCK: i32 = 5;

// ---
// Validação Customizada
// ---
fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("Value cannot be negative.".into());
        return Err(err);
    }
    Ok(())
}

// ---
// Payload: CreateProduct
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPayload {
    #[validate(length(min = 1, max = 200, message = "Name is required."))]
    pub name: String,

    #[validate(length(max = 64))]
    pub barcode: Option<String>,

    // Padrão: "unit"
    #[validate(length(min = 1, max = 32))]
    pub unit: Option<String>,

    pub description: Option<String>,

    pub category_id: Option<Uuid>,

    #[validate(custom(function = "validate_not_negative"))]
    #[schema(value_type = f64)]
    pub purchase_price: Decimal,

    #[validate(custom(function = "validate_not_negative"))]
    #[schema(value_type = f64)]
    pub sale_price: Decimal,

    // Padrão: 5
    #[validate(range(min = 0))]
    pub min_stock: Option<i32>,

    // Vira uma entrada "Initial stock"
    #[validate(range(min = 0))]
    #[serde(default)]
    pub initial_stock: i32,
}

// ---
// Payload: UpdateProduct (nunca altera o saldo)
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductPayload {
    #[validate(length(min = 1, max = 200, message = "Name is required."))]
    pub name: Option<String>,
    #[validate(length(max = 64))]
    pub barcode: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub unit: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    #[schema(value_type = Option<f64>)]
    pub purchase_price: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub sale_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub min_stock: Option<i32>,
}

impl From<UpdateProductPayload> for ProductPatch {
    fn from(p: UpdateProductPayload) -> Self {
        ProductPatch {
            name: p.name,
            barcode: p.barcode,
            unit: p.unit,
            description: p.description,
            category_id: p.category_id,
            purchase_price: p.purchase_price,
            sale_price: p.sale_price,
            min_stock: p.min_stock,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Nome ou código de barras (contém, sem diferenciar maiúsculas)
    pub search: Option<String>,
    /// Só produtos com saldo <= estoque mínimo
    #[serde(default)]
    pub low_stock: bool,
    pub category_id: Option<Uuid>,
    /// name | purchasePrice | salePrice | stock | createdAt (padrão: name)
    #[serde(default)]
    pub sort: ProductSort,
    /// asc | desc (padrão: asc)
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default = "pagination::default_page")]
    pub page: u32,
    #[serde(default = "pagination::default_limit")]
    pub limit: u32,
}

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Products",
    params(ProductQuery),
    responses((status = 200, description = "Produtos ativos", body = Page<Product>)),
    security(("api_jwt" = []))
)]
pub async fn list_products(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCatalogRead>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let q = query_params(query, &locale)?;
    let filter = ProductFilter {
        search: q.search,
        low_stock: q.low_stock,
        category_id: q.category_id,
        sort: q.sort,
        direction: q.direction,
        page: q.page,
        limit: q.limit,
    };

    let page = app_state
        .inventory_service
        .list_products(&actor, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Products",
    request_body = CreateProductPayload,
    responses(
        (status = 201, description = "Produto criado", body = Product),
        (status = 409, description = "Nome já usado por outro produto ativo")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCatalogWrite>,
    body: Result<Json<CreateProductPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(body, &locale)?;
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let product = NewProduct {
        name: payload.name,
        barcode: payload.barcode,
        unit: payload.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        description: payload.description,
        category_id: payload.category_id,
        purchase_price: payload.purchase_price,
        sale_price: payload.sale_price,
        min_stock: payload.min_stock.unwrap_or(DEFAULT_MIN_STOCK),
    };

    let created = app_state
        .inventory_service
        .create_product(&actor, product, payload.initial_stock)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "Products",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Produto", body = Product),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_product(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCatalogRead>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = app_state
        .inventory_service
        .get_product(&actor, product_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(product))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    tag = "Products",
    params(("id" = Uuid, Path, description = "ID do produto")),
    request_body = UpdateProductPayload,
    responses(
        (status = 200, description = "Produto atualizado", body = Product),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_product(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCatalogWrite>,
    Path(product_id): Path<Uuid>,
    body: Result<Json<UpdateProductPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(body, &locale)?;
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let product = app_state
        .inventory_service
        .update_product(&actor, product_id, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(product))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    tag = "Products",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 204, description = "Produto desativado"),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_product(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCatalogWrite>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .inventory_service
        .deactivate_product(&actor, product_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(StatusCode::NO_CONTENT)
}

// ---
// Categorias
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryPayload {
    #[validate(length(min = 1, max = 100, message = "Name is required."))]
    pub name: String,
    pub description: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/products/categories",
    tag = "Products",
    responses((status = 200, description = "Categorias, por nome", body = [Category])),
    security(("api_jwt" = []))
)]
pub async fn list_categories(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCatalogRead>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = app_state
        .inventory_service
        .list_categories(&actor)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(categories))
}

#[utoipa::path(
    post,
    path = "/api/products/categories",
    tag = "Products",
    request_body = CreateCategoryPayload,
    responses(
        (status = 201, description = "Categoria criada", body = Category),
        (status = 409, description = "Nome de categoria já usado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_category(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _guard: RequirePermission<PermCatalogWrite>,
    body: Result<Json<CreateCategoryPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(body, &locale)?;
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let category = app_state
        .inventory_service
        .create_category(
            &actor,
            NewCategory {
                name: payload.name,
                description: payload.description,
            },
        )
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(category)))
}
