// src/services/inventory_service.rs

use std::{borrow::Cow, sync::Arc};

use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{
    common::{error::AppError, pagination::Page},
    db::{InventoryStore, InventoryTx},
    models::{
        audit::{AuditAction, AuditEvent, EntityType},
        auth::{permissions, Actor},
        counterparty::CounterpartyKind,
        inventory::{
            Category, MovementFilter, MovementKind, MovementReceipt, MovementRequest,
            MovementView, NewCategory, NewMovement, NewProduct, Product, ProductFilter,
            ProductPatch, Quantity, ReversalReceipt, StockMovement,
        },
    },
    services::audit_service::AuditService,
};

const INITIAL_STOCK_COMMENT: &str = "Initial stock";

// ---
// Regras puras (sem I/O)
// ---

/// Produto pode receber a movimentação? Reaplicada dentro da transação, na linha bloqueada.
fn ensure_movable(product: &Product, kind: MovementKind, quantity: Quantity) -> Result<(), AppError> {
    if !product.active {
        return Err(AppError::ProductNotFound);
    }
    if kind == MovementKind::Exit && quantity.get() > product.stock {
        return Err(AppError::InsufficientStock {
            available: product.stock,
            requested: quantity.get(),
        });
    }
    Ok(())
}

/// Preço informado, ou o preço do produto (compra na entrada, venda na saída).
fn resolve_unit_price(product: &Product, kind: MovementKind, requested: Option<Decimal>) -> Decimal {
    requested.unwrap_or(match kind {
        MovementKind::Entry => product.purchase_price,
        MovementKind::Exit => product.sale_price,
    })
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn check_not_negative(errors: &mut ValidationErrors, field: &'static str, value: Option<Decimal>) {
    if value.is_some_and(|v| v < Decimal::ZERO) {
        errors.add(field, rule("range", "Value cannot be negative."));
    }
}

fn into_result(errors: ValidationErrors) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationError(errors))
    }
}

fn check_product_fields(
    name: Option<&str>,
    purchase_price: Option<Decimal>,
    sale_price: Option<Decimal>,
    min_stock: Option<i32>,
    initial_stock: Option<i32>,
) -> Result<(), AppError> {
    let mut errors = ValidationErrors::new();
    if name.is_some_and(|n| n.trim().is_empty()) {
        errors.add("name", rule("length", "Name is required."));
    }
    check_not_negative(&mut errors, "purchase_price", purchase_price);
    check_not_negative(&mut errors, "sale_price", sale_price);
    if min_stock.is_some_and(|m| m < 0) {
        errors.add("min_stock", rule("range", "Value cannot be negative."));
    }
    if initial_stock.is_some_and(|s| s < 0) {
        errors.add("initial_stock", rule("range", "Value cannot be negative."));
    }
    into_result(errors)
}

/// Parceiro precisa existir no tenant, estar ativo e ser do tipo certo para a movimentação.
async fn check_counterparty(
    tx: &mut dyn InventoryTx,
    tenant_id: Uuid,
    kind: MovementKind,
    counterparty_id: Uuid,
) -> Result<(), AppError> {
    let expected = CounterpartyKind::for_movement(kind);
    tx.find_counterparty(tenant_id, counterparty_id)
        .await?
        .filter(|c| c.active && c.kind == expected)
        .map(|_| ())
        .ok_or(AppError::CounterpartyNotFound)
}

async fn check_category(tx: &mut dyn InventoryTx, tenant_id: Uuid, category_id: Option<Uuid>) -> Result<(), AppError> {
    if let Some(category_id) = category_id {
        tx.find_category(tenant_id, category_id)
            .await?
            .ok_or(AppError::CategoryNotFound)?;
    }
    Ok(())
}

// Resultado da movimentação aplicada dentro de uma transação ainda aberta
struct AppliedMovement {
    product: Product,
    movement: StockMovement,
    new_stock: i32,
}

/// Passo central do livro-razão: bloqueia o produto, revalida, grava a movimentação e o novo saldo.
/// Não faz commit; quem abriu a transação decide.
async fn apply_movement(
    tx: &mut dyn InventoryTx,
    actor: &Actor,
    request: &MovementRequest,
    quantity: Quantity,
) -> Result<AppliedMovement, AppError> {
    // 1. SELECT ... FOR UPDATE
    let product = tx
        .lock_product(actor.tenant_id, request.product_id)
        .await?
        .ok_or(AppError::ProductNotFound)?;

    // 2. Mesma regra do validador, agora sobre o saldo bloqueado
    ensure_movable(&product, request.kind, quantity)?;
    let new_stock = request
        .kind
        .apply(product.stock, quantity)
        .ok_or(AppError::InvalidQuantity)?;

    // 3. Fornecedor (entrada) ou cliente (saída), do mesmo tenant
    if let Some(counterparty_id) = request.counterparty_id {
        check_counterparty(tx, actor.tenant_id, request.kind, counterparty_id).await?;
    }

    // 4. Movimentação
    let movement = tx
        .insert_movement(&NewMovement {
            tenant_id: actor.tenant_id,
            product_id: product.id,
            user_id: actor.user_id,
            kind: request.kind,
            quantity,
            unit_price: resolve_unit_price(&product, request.kind, request.unit_price),
            moved_at: request.moved_at.unwrap_or_else(chrono::Utc::now),
            counterparty_id: request.counterparty_id,
            comment: request.comment.clone(),
            reference: request.reference.clone(),
        })
        .await?;

    // 5. Saldo
    tx.write_stock(actor.tenant_id, product.id, new_stock).await?;

    Ok(AppliedMovement {
        product,
        movement,
        new_stock,
    })
}

fn movement_event(actor: &Actor, applied: &AppliedMovement) -> AuditEvent {
    let movement = &applied.movement;
    let (action, label) = match movement.kind {
        MovementKind::Entry => (AuditAction::StockEntry, "Entry"),
        MovementKind::Exit => (AuditAction::StockExit, "Exit"),
    };
    AuditEvent {
        tenant_id: actor.tenant_id,
        user_id: actor.user_id,
        action,
        entity_type: EntityType::Product,
        entity_id: applied.product.id,
        description: format!(
            "{label} of {} x {} (stock: {} -> {})",
            movement.quantity, applied.product.name, applied.product.stock, applied.new_stock
        ),
        before: None,
        after: Some(json!({
            "movementId": movement.id,
            "quantity": movement.quantity,
            "unitPrice": movement.unit_price,
            "reference": movement.reference,
        })),
    }
}

fn product_event(
    actor: &Actor,
    action: AuditAction,
    product: &Product,
    description: String,
    before: Option<&Product>,
    after: Option<&Product>,
) -> AuditEvent {
    AuditEvent {
        tenant_id: actor.tenant_id,
        user_id: actor.user_id,
        action,
        entity_type: EntityType::Product,
        entity_id: product.id,
        description,
        before: before.and_then(|p| serde_json::to_value(p).ok()),
        after: after.and_then(|p| serde_json::to_value(p).ok()),
    }
}

// ---
// Serviço
// ---
#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn InventoryStore>,
    audit: AuditService,
}

impl InventoryService {
    pub fn new(store: Arc<dyn InventoryStore>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    /// Validação somente leitura: nada é bloqueado nem gravado.
    pub async fn validate_movement(
        &self,
        tenant_id: Uuid,
        kind: MovementKind,
        product_id: Uuid,
        quantity: Decimal,
    ) -> Result<Product, AppError> {
        let quantity = Quantity::try_from(quantity)?;
        self.precheck(tenant_id, kind, product_id, quantity).await
    }

    // Pedido impossível falha aqui, antes de abrir transação e de bloquear qualquer linha.
    async fn precheck(
        &self,
        tenant_id: Uuid,
        kind: MovementKind,
        product_id: Uuid,
        quantity: Quantity,
    ) -> Result<Product, AppError> {
        let product = self
            .store
            .find_product(tenant_id, product_id)
            .await?
            .ok_or(AppError::ProductNotFound)?;
        ensure_movable(&product, kind, quantity)?;
        Ok(product)
    }

    // --- ENTRADA / SAÍDA ---
    pub async fn record_movement(
        &self,
        actor: &Actor,
        request: MovementRequest,
    ) -> Result<MovementReceipt, AppError> {
        actor.require(permissions::INVENTORY_WRITE)?;
        let quantity = Quantity::try_from(request.quantity)?;
        let mut errors = ValidationErrors::new();
        check_not_negative(&mut errors, "unit_price", request.unit_price);
        into_result(errors)?;
        self.precheck(actor.tenant_id, request.kind, request.product_id, quantity)
            .await?;

        // Qualquer `?` antes do commit derruba a transação (rollback no drop).
        let mut tx = self.store.begin(actor).await?;
        let applied = apply_movement(tx.as_mut(), actor, &request, quantity).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %actor.tenant_id,
            product_id = %applied.product.id,
            movement_id = %applied.movement.id,
            kind = request.kind.as_str(),
            quantity = quantity.get(),
            new_stock = applied.new_stock,
            "Movimentação registrada"
        );

        // Histórico fora da transação
        self.audit.record(movement_event(actor, &applied));

        Ok(MovementReceipt {
            movement_id: applied.movement.id,
            new_stock: applied.new_stock,
        })
    }

    // --- ESTORNO (admin) ---
    pub async fn cancel_movement(
        &self,
        actor: &Actor,
        movement_id: Uuid,
    ) -> Result<ReversalReceipt, AppError> {
        actor.require(permissions::INVENTORY_CANCEL)?;

        let mut tx = self.store.begin(actor).await?;

        // 1. Movimentação (bloqueada: dois estornos simultâneos não desfazem duas vezes)
        let movement = tx
            .lock_movement(actor.tenant_id, movement_id)
            .await?
            .ok_or(AppError::MovementNotFound)?;

        // 2. Produto
        let product = tx
            .lock_product(actor.tenant_id, movement.product_id)
            .await?
            .ok_or(AppError::ProductNotFound)?;

        // 3. Delta inverso, sem piso em zero
        let quantity = movement.quantity()?;
        let new_stock = movement
            .kind
            .revert(product.stock, quantity)
            .ok_or_else(|| anyhow::anyhow!("saldo fora do intervalo ao estornar {}", movement.id))?;
        tx.write_stock(actor.tenant_id, product.id, new_stock).await?;

        // 4. Remove a movimentação
        tx.delete_movement(actor.tenant_id, movement.id).await?;
        tx.commit().await?;

        if new_stock < 0 {
            tracing::warn!(
                tenant_id = %actor.tenant_id,
                product_id = %product.id,
                new_stock,
                "Estorno deixou o saldo negativo"
            );
        }
        tracing::info!(
            tenant_id = %actor.tenant_id,
            movement_id = %movement.id,
            new_stock,
            "Movimentação estornada"
        );

        self.audit.record(AuditEvent {
            tenant_id: actor.tenant_id,
            user_id: actor.user_id,
            action: AuditAction::MovementReversed,
            entity_type: EntityType::Product,
            entity_id: product.id,
            description: format!(
                "Reversal of {} movement {} (qty: {}, stock: {} -> {})",
                movement.kind.as_str(),
                movement.id,
                movement.quantity,
                product.stock,
                new_stock
            ),
            before: serde_json::to_value(&movement).ok(),
            after: None,
        });

        Ok(ReversalReceipt {
            movement_id: movement.id,
            product_id: product.id,
            new_stock,
        })
    }

    // --- CONSULTAS ---
    pub async fn get_movement(&self, actor: &Actor, movement_id: Uuid) -> Result<MovementView, AppError> {
        actor.require(permissions::INVENTORY_READ)?;
        self.store
            .find_movement(actor.tenant_id, movement_id)
            .await?
            .ok_or(AppError::MovementNotFound)
    }

    pub async fn list_movements(
        &self,
        actor: &Actor,
        filter: &MovementFilter,
    ) -> Result<Page<MovementView>, AppError> {
        actor.require(permissions::INVENTORY_READ)?;
        self.store.list_movements(actor.tenant_id, filter).await
    }

    // ---
    // Catálogo
    // ---

    /// Cria o produto com saldo 0 e, se houver saldo inicial, aplica uma entrada na mesma transação.
    pub async fn create_product(
        &self,
        actor: &Actor,
        mut product: NewProduct,
        initial_stock: i32,
    ) -> Result<Product, AppError> {
        actor.require(permissions::CATALOG_WRITE)?;
        product.name = product.name.trim().to_string();
        check_product_fields(
            Some(&product.name),
            Some(product.purchase_price),
            Some(product.sale_price),
            Some(product.min_stock),
            Some(initial_stock),
        )?;

        let mut tx = self.store.begin(actor).await?;
        check_category(tx.as_mut(), actor.tenant_id, product.category_id).await?;
        let mut created = tx.insert_product(actor.tenant_id, &product).await?;

        if initial_stock > 0 {
            let mut request = MovementRequest::new(MovementKind::Entry, created.id, initial_stock);
            request.unit_price = Some(created.purchase_price);
            request.comment = Some(INITIAL_STOCK_COMMENT.to_string());
            let quantity = Quantity::new(i64::from(initial_stock))?;
            let applied = apply_movement(tx.as_mut(), actor, &request, quantity).await?;
            created.stock = applied.new_stock;
        }
        tx.commit().await?;

        tracing::info!(
            tenant_id = %actor.tenant_id,
            product_id = %created.id,
            initial_stock,
            "Produto criado"
        );
        self.audit.record(product_event(
            actor,
            AuditAction::ProductCreated,
            &created,
            format!("Product \"{}\" created", created.name),
            None,
            Some(&created),
        ));

        Ok(created)
    }

    pub async fn get_product(&self, actor: &Actor, product_id: Uuid) -> Result<Product, AppError> {
        actor.require(permissions::CATALOG_READ)?;
        self.store
            .find_product(actor.tenant_id, product_id)
            .await?
            .filter(|p| p.active)
            .ok_or(AppError::ProductNotFound)
    }

    pub async fn list_products(&self, actor: &Actor, filter: &ProductFilter) -> Result<Page<Product>, AppError> {
        actor.require(permissions::CATALOG_READ)?;
        self.store.list_products(actor.tenant_id, filter).await
    }

    /// Nunca altera o saldo: isso é trabalho das movimentações.
    pub async fn update_product(
        &self,
        actor: &Actor,
        product_id: Uuid,
        mut patch: ProductPatch,
    ) -> Result<Product, AppError> {
        actor.require(permissions::CATALOG_WRITE)?;
        patch.name = patch.name.map(|n| n.trim().to_string());
        check_product_fields(
            patch.name.as_deref(),
            patch.purchase_price,
            patch.sale_price,
            patch.min_stock,
            None,
        )?;

        let mut tx = self.store.begin(actor).await?;
        let before = tx
            .lock_product(actor.tenant_id, product_id)
            .await?
            .filter(|p| p.active)
            .ok_or(AppError::ProductNotFound)?;
        check_category(tx.as_mut(), actor.tenant_id, patch.category_id).await?;
        let after = tx.update_product(actor.tenant_id, product_id, &patch).await?;
        tx.commit().await?;

        let (action, description) = if patch.changes_price(&before) {
            (
                AuditAction::PriceChanged,
                format!(
                    "Prices of \"{}\" changed (purchase: {} -> {}, sale: {} -> {})",
                    after.name,
                    before.purchase_price,
                    after.purchase_price,
                    before.sale_price,
                    after.sale_price
                ),
            )
        } else {
            (AuditAction::ProductUpdated, format!("Product \"{}\" updated", after.name))
        };
        self.audit
            .record(product_event(actor, action, &after, description, Some(&before), Some(&after)));

        Ok(after)
    }

    // --- CATEGORIAS ---
    pub async fn list_categories(&self, actor: &Actor) -> Result<Vec<Category>, AppError> {
        actor.require(permissions::CATALOG_READ)?;
        self.store.list_categories(actor.tenant_id).await
    }

    pub async fn create_category(&self, actor: &Actor, mut category: NewCategory) -> Result<Category, AppError> {
        actor.require(permissions::CATALOG_WRITE)?;
        category.name = category.name.trim().to_string();
        check_product_fields(Some(&category.name), None, None, None, None)?;

        let mut tx = self.store.begin(actor).await?;
        let created = tx.insert_category(actor.tenant_id, &category).await?;
        tx.commit().await?;

        tracing::info!(tenant_id = %actor.tenant_id, category_id = %created.id, "Categoria criada");
        Ok(created)
    }

    /// Desativação lógica; as movimentações continuam consultáveis.
    pub async fn deactivate_product(&self, actor: &Actor, product_id: Uuid) -> Result<(), AppError> {
        actor.require(permissions::CATALOG_WRITE)?;

        let mut tx = self.store.begin(actor).await?;
        let product = tx
            .lock_product(actor.tenant_id, product_id)
            .await?
            .filter(|p| p.active)
            .ok_or(AppError::ProductNotFound)?;
        tx.deactivate_product(actor.tenant_id, product_id).await?;
        tx.commit().await?;

        self.audit.record(product_event(
            actor,
            AuditAction::ProductDeleted,
            &product,
            format!("Product \"{}\" deleted", product.name),
            Some(&product),
            None,
        ));
        Ok(())
    }
}
