// src/services/audit_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::{error::AppError, pagination::Page},
    db::AuditStore,
    models::audit::{AuditEntry, AuditEvent, AuditFilter},
};

// Histórico de ações. A gravação é "fire-and-forget": nunca bloqueia nem
// desfaz a operação de negócio que a disparou.
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn AuditStore>,
}

impl AuditService {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Agenda a gravação do evento numa task própria.
    pub fn record(&self, event: AuditEvent) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.append(&event).await {
                tracing::warn!(
                    tenant_id = %event.tenant_id,
                    action = event.action.as_str(),
                    entity_id = %event.entity_id,
                    error = %e,
                    "Falha ao gravar histórico; operação mantida"
                );
            }
        });
    }

    pub async fn list(&self, tenant_id: Uuid, filter: &AuditFilter) -> Result<Page<AuditEntry>, AppError> {
        self.store.list(tenant_id, filter).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        db::MemoryAuditStore,
        models::audit::{AuditAction, EntityType},
    };

    fn event(tenant_id: Uuid, action: AuditAction, product_id: Uuid) -> AuditEvent {
        AuditEvent {
            tenant_id,
            user_id: Uuid::new_v4(),
            action,
            entity_type: EntityType::Product,
            entity_id: product_id,
            description: "test".into(),
            before: None,
            after: None,
        }
    }

    async fn wait_for(store: &MemoryAuditStore, count: usize) {
        for _ in 0..100 {
            if store.entries().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn record_is_written_in_background() {
        let store = MemoryAuditStore::new();
        let audit = AuditService::new(Arc::new(store.clone()));
        let tenant = Uuid::new_v4();

        audit.record(event(tenant, AuditAction::StockEntry, Uuid::new_v4()));
        wait_for(&store, 1).await;

        let page = audit.list(tenant, &AuditFilter::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].action, "stock_entry");
    }

    #[tokio::test]
    async fn unavailable_store_is_swallowed() {
        let store = MemoryAuditStore::new();
        store.set_unavailable(true);
        let audit = AuditService::new(Arc::new(store.clone()));

        audit.record(event(Uuid::new_v4(), AuditAction::StockExit, Uuid::new_v4()));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_tenant_product_and_action() {
        let store = MemoryAuditStore::new();
        let audit = AuditService::new(Arc::new(store.clone()));
        let tenant = Uuid::new_v4();
        let product = Uuid::new_v4();

        for e in [
            event(tenant, AuditAction::StockEntry, product),
            event(tenant, AuditAction::StockExit, product),
            event(tenant, AuditAction::StockEntry, Uuid::new_v4()),
            event(Uuid::new_v4(), AuditAction::StockEntry, product),
        ] {
            store.append(&e).await.unwrap();
        }

        let filter = AuditFilter {
            product_id: Some(product),
            action: Some(AuditAction::StockEntry),
            ..Default::default()
        };
        let page = audit.list(tenant, &filter).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].entity_id, Some(product));
    }
}
