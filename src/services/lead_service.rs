// src/services/lead_service.rs

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LeadRepository, SalesmanRepository},
    models::{
        lead::{Lead, LeadEvent, LeadEventKind, LeadStatus, Message, MessageDirection},
        notification::{NotificationDraft, NotificationKind},
        sla::SlaTrigger,
    },
    services::{notification_service::NotificationService, sla_service::SlaEngine},
};

const TIMELINE_LIMIT: i64 = 200;

/// Ações humanas sobre um lead: resposta, status e atribuição manual.
#[derive(Clone)]
pub struct LeadService {
    pool: PgPool,
    leads: LeadRepository,
    salesmen: SalesmanRepository,
    sla: SlaEngine,
    notifications: NotificationService,
}

impl LeadService {
    pub fn new(
        pool: PgPool,
        leads: LeadRepository,
        salesmen: SalesmanRepository,
        sla: SlaEngine,
        notifications: NotificationService,
    ) -> Self {
        Self {
            pool,
            leads,
            salesmen,
            sla,
            notifications,
        }
    }

    /// Grava a resposta (OUT) e encerra as violações PENDING do lead.
    pub async fn send_reply(&self, tenant_id: Uuid, lead_id: Uuid, body: &str) -> Result<Message, AppError> {
        let mut tx = self.pool.begin().await?;

        let lead = self
            .leads
            .find_by_id(&mut *tx, tenant_id, lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;

        let message = self
            .leads
            .insert_message(&mut *tx, tenant_id, lead.id, MessageDirection::Out, lead.channel, body)
            .await?;
        self.leads
            .append_event(&mut *tx, tenant_id, lead.id, LeadEventKind::ReplySent, json!({ "messageId": message.id }))
            .await?;

        tx.commit().await?;

        // A mensagem já saiu; não devolvemos erro por causa do SLA.
        match self.sla.mark_responded(tenant_id, lead.id).await {
            Ok(responded) => {
                tracing::debug!(tenant_id = %tenant_id, lead_id = %lead.id, responded, "SLA respondido");
            }
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, lead_id = %lead.id, error = %e, "Falha ao marcar SLA como respondido");
            }
        }

        Ok(message)
    }

    pub async fn update_status(&self, tenant_id: Uuid, lead_id: Uuid, status: LeadStatus) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = self
            .leads
            .find_by_id(&mut *tx, tenant_id, lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;

        if current.status == status {
            return Ok(current);
        }

        let updated = self.leads.update_status(&mut *tx, tenant_id, lead_id, status).await?;
        self.leads
            .append_event(
                &mut *tx,
                tenant_id,
                lead_id,
                LeadEventKind::StatusChanged,
                json!({ "from": current.status, "to": status }),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant_id, lead_id = %lead_id, from = ?current.status, to = ?status, "Status do lead alterado");
        Ok(updated)
    }

    /// Atribuição manual (ou remoção com `None`). Não respeita capacidade:
    /// é uma decisão explícita de um gestor.
    pub async fn assign_manually(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        salesman_id: Option<Uuid>,
    ) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut lead = self
            .leads
            .find_by_id(&mut *tx, tenant_id, lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;

        let salesman = match salesman_id {
            Some(id) => Some(
                self.salesmen
                    .find_by_id(&mut *tx, tenant_id, id)
                    .await?
                    .ok_or(AppError::SalesmanNotFound)?,
            ),
            None => None,
        };

        let previous = lead.assigned_to_salesman_id;
        if previous == salesman_id {
            return Ok(lead);
        }

        if !self
            .leads
            .swap_assignee(&mut *tx, tenant_id, lead_id, previous, salesman_id)
            .await?
        {
            return Err(AppError::AssignmentConflict);
        }

        self.leads
            .append_event(
                &mut *tx,
                tenant_id,
                lead_id,
                LeadEventKind::Assigned,
                json!({ "fromSalesmanId": previous, "toSalesmanId": salesman_id }),
            )
            .await?;

        tx.commit().await?;
        lead.assigned_to_salesman_id = salesman_id;

        if let Some(salesman) = salesman {
            let draft = NotificationDraft::about_lead(
                NotificationKind::LeadAssigned,
                "Novo lead atribuído",
                lead.display_label(),
                lead.id,
            );
            self.notifications.notify_user(tenant_id, salesman.user_id, &draft).await;
            self.sla.trigger(tenant_id, SlaTrigger::LeadAssigned, &lead.snapshot()).await;
        }

        tracing::info!(tenant_id = %tenant_id, lead_id = %lead_id, from = ?previous, to = ?salesman_id, "Lead atribuído manualmente");
        Ok(lead)
    }

    pub async fn timeline(&self, tenant_id: Uuid, lead_id: Uuid) -> Result<Vec<LeadEvent>, AppError> {
        self.leads
            .find_by_id(&self.pool, tenant_id, lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;

        self.leads
            .list_events(&self.pool, tenant_id, lead_id, TIMELINE_LIMIT)
            .await
    }

    /// Fechamento manual das violações abertas do lead.
    pub async fn resolve_sla(&self, tenant_id: Uuid, lead_id: Uuid) -> Result<u64, AppError> {
        self.leads
            .find_by_id(&self.pool, tenant_id, lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;

        self.sla.mark_resolved(tenant_id, lead_id).await
    }
}
