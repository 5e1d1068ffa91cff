// src/services/counterparty_service.rs

use std::sync::Arc;

use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{
    common::{error::AppError, pagination::Page},
    db::CounterpartyStore,
    models::{
        audit::{AuditAction, AuditEvent},
        auth::{permissions, Actor},
        counterparty::{
            Counterparty, CounterpartyFilter, CounterpartyKind, CounterpartyPatch, NewCounterparty,
        },
    },
    services::audit_service::AuditService,
};

fn check_name(name: Option<&str>) -> Result<(), AppError> {
    if name.is_some_and(|n| n.is_empty()) {
        let mut errors = ValidationErrors::new();
        errors.add("name", ValidationError::new("length").with_message("Name is required.".into()));
        return Err(AppError::ValidationError(errors));
    }
    Ok(())
}

// Cadastro de fornecedores e clientes.
#[derive(Clone)]
pub struct CounterpartyService {
    store: Arc<dyn CounterpartyStore>,
    audit: AuditService,
}

impl CounterpartyService {
    pub fn new(store: Arc<dyn CounterpartyStore>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    fn event(
        actor: &Actor,
        action: AuditAction,
        row: &Counterparty,
        verb: &str,
        before: Option<&Counterparty>,
        after: Option<&Counterparty>,
    ) -> AuditEvent {
        AuditEvent {
            tenant_id: actor.tenant_id,
            user_id: actor.user_id,
            action,
            entity_type: row.kind.into(),
            entity_id: row.id,
            description: format!("{} \"{}\" {verb}", row.kind.label(), row.name),
            before: before.and_then(|c| serde_json::to_value(c).ok()),
            after: after.and_then(|c| serde_json::to_value(c).ok()),
        }
    }

    pub async fn list(
        &self,
        actor: &Actor,
        kind: CounterpartyKind,
        filter: &CounterpartyFilter,
    ) -> Result<Page<Counterparty>, AppError> {
        actor.require(permissions::COUNTERPARTIES_READ)?;
        self.store.list_counterparties(actor.tenant_id, kind, filter).await
    }

    pub async fn get(&self, actor: &Actor, kind: CounterpartyKind, id: Uuid) -> Result<Counterparty, AppError> {
        actor.require(permissions::COUNTERPARTIES_READ)?;
        self.store
            .find_counterparty(actor.tenant_id, kind, id)
            .await?
            .ok_or(AppError::CounterpartyNotFound)
    }

    pub async fn create(
        &self,
        actor: &Actor,
        kind: CounterpartyKind,
        mut counterparty: NewCounterparty,
    ) -> Result<Counterparty, AppError> {
        actor.require(permissions::COUNTERPARTIES_WRITE)?;
        counterparty.name = counterparty.name.trim().to_string();
        check_name(Some(&counterparty.name))?;

        let created = self.store.insert_counterparty(actor.tenant_id, kind, &counterparty).await?;

        tracing::info!(
            tenant_id = %actor.tenant_id,
            counterparty_id = %created.id,
            kind = kind.as_str(),
            "Parceiro criado"
        );
        self.audit.record(Self::event(
            actor,
            AuditAction::CounterpartyCreated,
            &created,
            "created",
            None,
            Some(&created),
        ));
        Ok(created)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        kind: CounterpartyKind,
        id: Uuid,
        mut patch: CounterpartyPatch,
    ) -> Result<Counterparty, AppError> {
        actor.require(permissions::COUNTERPARTIES_WRITE)?;
        patch.name = patch.name.map(|n| n.trim().to_string());
        check_name(patch.name.as_deref())?;

        let before = self
            .store
            .find_counterparty(actor.tenant_id, kind, id)
            .await?
            .ok_or(AppError::CounterpartyNotFound)?;
        let after = self
            .store
            .update_counterparty(actor.tenant_id, kind, id, &patch)
            .await?
            .ok_or(AppError::CounterpartyNotFound)?;

        self.audit.record(Self::event(
            actor,
            AuditAction::CounterpartyUpdated,
            &after,
            "updated",
            Some(&before),
            Some(&after),
        ));
        Ok(after)
    }

    /// Exclusão lógica: movimentações antigas continuam mostrando o nome.
    pub async fn deactivate(&self, actor: &Actor, kind: CounterpartyKind, id: Uuid) -> Result<(), AppError> {
        actor.require(permissions::COUNTERPARTIES_WRITE)?;
        let row = self
            .store
            .find_counterparty(actor.tenant_id, kind, id)
            .await?
            .ok_or(AppError::CounterpartyNotFound)?;
        if !self.store.deactivate_counterparty(actor.tenant_id, kind, id).await? {
            return Err(AppError::CounterpartyNotFound);
        }

        self.audit.record(Self::event(
            actor,
            AuditAction::CounterpartyDeleted,
            &row,
            "deleted",
            Some(&row),
            None,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        db::{MemoryAuditStore, MemoryInventoryStore},
        models::auth::Role,
    };

    struct Fixture {
        service: CounterpartyService,
        audit: MemoryAuditStore,
        admin: Actor,
        employee: Actor,
    }

    fn fixture() -> Fixture {
        let audit = MemoryAuditStore::new();
        let service = CounterpartyService::new(
            Arc::new(MemoryInventoryStore::new()),
            AuditService::new(Arc::new(audit.clone())),
        );
        let tenant_id = Uuid::new_v4();
        Fixture {
            service,
            audit,
            admin: Actor { user_id: Uuid::new_v4(), tenant_id, role: Role::Admin },
            employee: Actor { user_id: Uuid::new_v4(), tenant_id, role: Role::Employee },
        }
    }

    fn named(name: &str) -> NewCounterparty {
        NewCounterparty {
            name: name.into(),
            phone: Some("+221 33 800 00 00".into()),
            email: None,
            address: None,
        }
    }

    async fn wait_for(audit: &MemoryAuditStore, action: &str) -> usize {
        for _ in 0..100 {
            let n = audit.entries().iter().filter(|e| e.action == action).count();
            if n > 0 {
                return n;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        0
    }

    #[tokio::test]
    async fn suppliers_and_clients_live_in_separate_lists() {
        let fx = fixture();
        let supplier = fx
            .service
            .create(&fx.admin, CounterpartyKind::Supplier, named("  Moulins du Sahel "))
            .await
            .unwrap();
        assert_eq!(supplier.name, "Moulins du Sahel");
        fx.service.create(&fx.admin, CounterpartyKind::Client, named("Boutique Fall")).await.unwrap();

        let suppliers = fx
            .service
            .list(&fx.employee, CounterpartyKind::Supplier, &CounterpartyFilter::default())
            .await
            .unwrap();
        assert_eq!(suppliers.total, 1);
        assert_eq!(suppliers.items[0].id, supplier.id);

        // Um fornecedor não é encontrado na rota de clientes
        let err = fx.service.get(&fx.employee, CounterpartyKind::Client, supplier.id).await.unwrap_err();
        assert!(matches!(err, AppError::CounterpartyNotFound));
    }

    #[tokio::test]
    async fn writes_are_admin_only_and_names_required() {
        let fx = fixture();
        let err = fx
            .service
            .create(&fx.employee, CounterpartyKind::Client, named("Kiosque"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(permissions::COUNTERPARTIES_WRITE)));

        let err = fx.service.create(&fx.admin, CounterpartyKind::Client, named("   ")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn update_then_soft_delete_is_audited() {
        let fx = fixture();
        let client = fx.service.create(&fx.admin, CounterpartyKind::Client, named("Chez Ami")).await.unwrap();

        let patch = CounterpartyPatch { email: Some("ami@test.sn".into()), ..Default::default() };
        let updated = fx.service.update(&fx.admin, CounterpartyKind::Client, client.id, patch).await.unwrap();
        assert_eq!(updated.email.as_deref(), Some("ami@test.sn"));
        assert_eq!(updated.name, "Chez Ami");

        fx.service.deactivate(&fx.admin, CounterpartyKind::Client, client.id).await.unwrap();
        let err = fx.service.get(&fx.admin, CounterpartyKind::Client, client.id).await.unwrap_err();
        assert!(matches!(err, AppError::CounterpartyNotFound));
        let err = fx.service.deactivate(&fx.admin, CounterpartyKind::Client, client.id).await.unwrap_err();
        assert!(matches!(err, AppError::CounterpartyNotFound));

        assert_eq!(wait_for(&fx.audit, "counterparty_created").await, 1);
        assert_eq!(wait_for(&fx.audit, "counterparty_updated").await, 1);
        assert_eq!(wait_for(&fx.audit, "counterparty_deleted").await, 1);
        let deleted = fx.audit.entries().into_iter().find(|e| e.action == "counterparty_deleted").unwrap();
        assert_eq!(deleted.entity_type, "client");
    }

    #[tokio::test]
    async fn other_tenants_do_not_see_the_partner() {
        let fx = fixture();
        let supplier = fx
            .service
            .create(&fx.admin, CounterpartyKind::Supplier, named("Import Export"))
            .await
            .unwrap();
        let intruder = Actor { tenant_id: Uuid::new_v4(), ..fx.admin };

        let err = fx.service.get(&intruder, CounterpartyKind::Supplier, supplier.id).await.unwrap_err();
        assert!(matches!(err, AppError::CounterpartyNotFound));
        let patch = CounterpartyPatch { name: Some("Hijack".into()), ..Default::default() };
        let err = fx.service.update(&intruder, CounterpartyKind::Supplier, supplier.id, patch).await.unwrap_err();
        assert!(matches!(err, AppError::CounterpartyNotFound));
        let page = fx
            .service
            .list(&intruder, CounterpartyKind::Supplier, &CounterpartyFilter::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }
}
