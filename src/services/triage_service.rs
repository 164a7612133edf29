// src/services/triage_service.rs

use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LeadRepository, TriageRepository},
    models::{
        lead::{Lead, LeadEventKind, MessageDirection},
        notification::{NotificationDraft, NotificationKind, UserRole},
        sla::SlaTrigger,
        triage::{IngestOutcome, InboundMessage, ReplyDraft},
    },
    services::{
        ai_gateway::{AiGateway, ReplyRequest, TriageRequest},
        assignment_service::{AssignOutcome, AssignmentService},
        notification_service::NotificationService,
        sla_service::SlaEngine,
    },
};

const DEFAULT_ESCALATION_REASON: &str = "AI_ESCALATION";

/// Fluxo de cada mensagem de cliente: lead, triagem por IA, e então
/// escalonamento humano OU atribuição automática + resposta.
#[derive(Clone)]
pub struct TriageOrchestrator {
    pool: PgPool,
    leads: LeadRepository,
    triage: TriageRepository,
    ai: Arc<dyn AiGateway>,
    assignment: AssignmentService,
    sla: SlaEngine,
    notifications: NotificationService,
}

impl TriageOrchestrator {
    pub fn new(
        pool: PgPool,
        leads: LeadRepository,
        triage: TriageRepository,
        ai: Arc<dyn AiGateway>,
        assignment: AssignmentService,
        sla: SlaEngine,
        notifications: NotificationService,
    ) -> Self {
        Self {
            pool,
            leads,
            triage,
            ai,
            assignment,
            sla,
            notifications,
        }
    }

    pub async fn ingest(&self, tenant_id: Uuid, inbound: &InboundMessage) -> Result<IngestOutcome, AppError> {
        // 1. Lead + mensagem de entrada
        let mut tx = self.pool.begin().await?;
        let (lead, lead_created) = match self.leads.find_for_inbound(&mut *tx, tenant_id, inbound).await? {
            Some(found) => (found, false),
            None => (self.leads.create(&mut *tx, tenant_id, inbound).await?, true),
        };
        self.leads
            .insert_message(&mut *tx, tenant_id, lead.id, MessageDirection::In, inbound.channel, &inbound.body)
            .await?;
        tx.commit().await?;

        tracing::info!(tenant_id = %tenant_id, lead_id = %lead.id, lead_created, channel = ?inbound.channel, "📥 Mensagem recebida");

        let event = if lead_created {
            SlaTrigger::NewLead
        } else {
            SlaTrigger::MessageReceived
        };
        self.sla.trigger(tenant_id, event, &lead.snapshot()).await;

        // 2. Triagem (idioma + temperatura)
        let triage = self
            .ai
            .triage(TriageRequest {
                lead_id: lead.id,
                channel: lead.channel,
                customer_message: &inbound.body,
            })
            .await?;

        let mut tx = self.pool.begin().await?;
        let lead = self
            .leads
            .update_triage(&mut *tx, tenant_id, lead.id, &triage.language, triage.heat)
            .await?;
        self.leads
            .append_event(&mut *tx, tenant_id, lead.id, LeadEventKind::AiTriage, json!(triage))
            .await?;
        tx.commit().await?;

        // 3. Rascunho de resposta
        let draft = self
            .ai
            .draft_reply(ReplyRequest {
                lead_id: lead.id,
                channel: lead.channel,
                customer_message: &inbound.body,
                pricing_allowed: false,
            })
            .await?;
        self.leads
            .append_event(&self.pool, tenant_id, lead.id, LeadEventKind::AiDraftReply, json!(draft))
            .await?;

        // 4. Escalonamento curto-circuita a atribuição: o lead fica sem dono.
        let mut assigned_salesman_id = lead.assigned_to_salesman_id;
        if draft.should_escalate {
            self.escalate(&lead, &draft).await?;
        } else {
            if lead.assigned_to_salesman_id.is_none() {
                assigned_salesman_id = self.try_auto_assign(&lead).await?;
            }
            self.leads
                .insert_message(&self.pool, tenant_id, lead.id, MessageDirection::Out, inbound.channel, &draft.message)
                .await?;
        }

        Ok(IngestOutcome {
            lead_id: lead.id,
            lead_created,
            escalated: draft.should_escalate,
            assigned_salesman_id,
            triage,
            draft,
        })
    }

    async fn escalate(&self, lead: &Lead, draft: &ReplyDraft) -> Result<(), AppError> {
        let reason = draft
            .escalation_reason
            .as_deref()
            .unwrap_or(DEFAULT_ESCALATION_REASON);

        // Checagem e inserção não são atômicas; duplicata concorrente é tolerada.
        if self.triage.find_open_for_lead(&self.pool, lead.tenant_id, lead.id).await?.is_some() {
            tracing::debug!(lead_id = %lead.id, "Lead já está na fila de triagem");
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let item = self.triage.open_item(&mut *tx, lead.tenant_id, lead.id, reason).await?;
        self.leads
            .append_event(
                &mut *tx,
                lead.tenant_id,
                lead.id,
                LeadEventKind::TriageEscalated,
                json!({ "reason": reason, "triageItemId": item.id }),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(tenant_id = %lead.tenant_id, lead_id = %lead.id, reason, "⚠️ Lead escalado para triagem humana");

        let notification = NotificationDraft::about_lead(
            NotificationKind::TriageEscalated,
            "Escalonamento de triagem",
            format!("{reason} (lead {})", lead.display_label()),
            lead.id,
        );
        self.notifications
            .notify_roles(lead.tenant_id, &UserRole::SUPERVISORS, &notification)
            .await;

        self.sla.trigger(lead.tenant_id, SlaTrigger::TriageEscalated, &lead.snapshot()).await;
        Ok(())
    }

    async fn try_auto_assign(&self, lead: &Lead) -> Result<Option<Uuid>, AppError> {
        let config = self.assignment.config_for(lead.tenant_id).await?;
        if !config.auto_assign {
            return Ok(None);
        }

        match self.assignment.auto_assign(lead.tenant_id, lead.id, None, None).await? {
            AssignOutcome::Assigned(salesman) => {
                self.leads
                    .append_event(
                        &self.pool,
                        lead.tenant_id,
                        lead.id,
                        LeadEventKind::AutoAssigned,
                        json!({ "salesmanId": salesman.id, "mode": config.strategy }),
                    )
                    .await?;

                let notification = NotificationDraft::about_lead(
                    NotificationKind::LeadAssigned,
                    "Novo lead atribuído",
                    lead.display_label(),
                    lead.id,
                );
                self.notifications
                    .notify_user(lead.tenant_id, salesman.user_id, &notification)
                    .await;

                let mut snapshot = lead.snapshot();
                snapshot.assigned_to_salesman_id = Some(salesman.id);
                self.sla.trigger(lead.tenant_id, SlaTrigger::LeadAssigned, &snapshot).await;

                tracing::info!(tenant_id = %lead.tenant_id, lead_id = %lead.id, salesman_id = %salesman.id, "Lead atribuído automaticamente");
                Ok(Some(salesman.id))
            }
            AssignOutcome::LeadTaken => {
                // Outra requisição atribuiu primeiro; devolvemos o dono atual.
                let current = self.leads.find_by_id(&self.pool, lead.tenant_id, lead.id).await?;
                Ok(current.and_then(|l| l.assigned_to_salesman_id))
            }
            AssignOutcome::NoEligibleSalesman => {
                tracing::info!(tenant_id = %lead.tenant_id, lead_id = %lead.id, "Nenhum vendedor elegível; lead fica sem dono");
                Ok(None)
            }
        }
    }
}
