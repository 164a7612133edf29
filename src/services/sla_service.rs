// src/services/sla_service.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{clock::Clock, error::AppError},
    db::{LeadRepository, SlaRepository},
    models::{
        lead::{Lead, LeadEventKind, LeadSnapshot},
        notification::{NotificationDraft, NotificationKind},
        sla::{
            LeadSlaStatus, NewSlaRule, SlaAnalytics, SlaRule, SlaTrigger, SlaViolation, SlaViolationStatus,
        },
    },
    services::{
        assignment_service::{AssignOutcome, AssignmentService},
        notification_service::NotificationService,
    },
};

// Violações processadas por varredura; o resto fica para a próxima.
const SWEEP_BATCH: i64 = 500;

// =============================================================================
//  FUNÇÕES PURAS
// =============================================================================

/// Filtros opcionais da regra: ausente casa com qualquer valor.
pub fn rule_applies(rule: &SlaRule, lead: &LeadSnapshot) -> bool {
    rule.lead_status.is_none_or(|s| s == lead.status)
        && rule.lead_heat.is_none_or(|h| h == lead.heat)
        && rule.channel.is_none_or(|c| c == lead.channel)
}

pub fn matching_rules<'a>(rules: &'a [SlaRule], event: SlaTrigger, lead: &LeadSnapshot) -> Vec<&'a SlaRule> {
    rules
        .iter()
        .filter(|r| r.is_active && r.trigger_on == event && rule_applies(r, lead))
        .collect()
}

pub fn due_at(triggered_at: DateTime<Utc>, rule: &SlaRule) -> DateTime<Utc> {
    triggered_at + Duration::minutes(i64::from(rule.response_time_minutes))
}

/// Minutos inteiros de atraso, arredondados para baixo.
pub fn breach_minutes(now: DateTime<Utc>, due: DateTime<Utc>) -> i32 {
    let minutes = (now - due).num_minutes().max(0);
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

fn escalation_due(rule: &SlaRule, due: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    rule.escalation_time_minutes
        .is_some_and(|mins| now >= due + Duration::minutes(i64::from(mins)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    Skip,
    /// PENDING vencida. `escalate` quando a janela de escalonamento também já passou.
    Breach { minutes: i32, escalate: bool },
    Escalate,
}

pub fn plan_violation(violation: &SlaViolation, rule: &SlaRule, now: DateTime<Utc>) -> SweepAction {
    let status = violation.status;

    if status.can_transition_to(SlaViolationStatus::Breached) {
        if violation.due_at > now {
            return SweepAction::Skip;
        }
        return SweepAction::Breach {
            minutes: breach_minutes(now, violation.due_at),
            escalate: escalation_due(rule, violation.due_at, now),
        };
    }

    if status.can_transition_to(SlaViolationStatus::Escalated) && escalation_due(rule, violation.due_at, now) {
        return SweepAction::Escalate;
    }

    SweepAction::Skip
}

// =============================================================================
//  RELATÓRIO DA VARREDURA
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub scanned: usize,
    pub breached: usize,
    pub escalated: usize,
    pub reassigned: usize,
    pub notifications: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct ItemOutcome {
    breached: bool,
    escalated: bool,
    reassigned: bool,
    notifications: usize,
}

// =============================================================================
//  MOTOR DE SLA
// =============================================================================

#[derive(Clone)]
pub struct SlaEngine {
    pool: PgPool,
    repo: SlaRepository,
    leads: LeadRepository,
    notifications: NotificationService,
    assignment: AssignmentService,
    clock: Arc<dyn Clock>,
}

impl SlaEngine {
    pub fn new(
        pool: PgPool,
        repo: SlaRepository,
        leads: LeadRepository,
        notifications: NotificationService,
        assignment: AssignmentService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            repo,
            leads,
            notifications,
            assignment,
            clock,
        }
    }

    // =========================================================================
    //  1. REGRAS
    // =========================================================================

    pub async fn create_rule(&self, tenant_id: Uuid, rule: &NewSlaRule) -> Result<SlaRule, AppError> {
        let created = self.repo.create_rule(&self.pool, tenant_id, rule).await?;
        tracing::info!(tenant_id = %tenant_id, rule_id = %created.id, trigger = ?created.trigger_on, "Regra de SLA criada");
        Ok(created)
    }

    pub async fn list_rules(&self, tenant_id: Uuid) -> Result<Vec<SlaRule>, AppError> {
        self.repo.list_rules(&self.pool, tenant_id).await
    }

    /// Regras desativadas param de abrir violações; as já abertas seguem o ciclo.
    pub async fn set_rule_active(&self, tenant_id: Uuid, rule_id: Uuid, is_active: bool) -> Result<SlaRule, AppError> {
        self.repo
            .set_rule_active(&self.pool, tenant_id, rule_id, is_active)
            .await?
            .ok_or(AppError::SlaRuleNotFound)
    }

    // =========================================================================
    //  2. DISPARO
    // =========================================================================

    /// Cria uma violação PENDING por regra aplicável. Nunca falha para quem
    /// chama: problemas de banco viram log e o disparo vira no-op.
    pub async fn trigger(&self, tenant_id: Uuid, event: SlaTrigger, lead: &LeadSnapshot) -> usize {
        match self.try_trigger(tenant_id, event, lead).await {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    lead_id = %lead.id,
                    event = ?event,
                    error = %e,
                    "Disparo de SLA ignorado"
                );
                0
            }
        }
    }

    async fn try_trigger(&self, tenant_id: Uuid, event: SlaTrigger, lead: &LeadSnapshot) -> Result<usize, AppError> {
        let rules = self.repo.list_active_rules_for(&self.pool, tenant_id, event).await?;
        let applicable = matching_rules(&rules, event, lead);
        if applicable.is_empty() {
            return Ok(0);
        }

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        for rule in &applicable {
            self.repo
                .insert_violation(&mut *tx, tenant_id, rule.id, lead.id, now, due_at(now, rule))
                .await?;
        }
        tx.commit().await?;

        tracing::debug!(tenant_id = %tenant_id, lead_id = %lead.id, event = ?event, created = applicable.len(), "Violações de SLA abertas");
        Ok(applicable.len())
    }

    // =========================================================================
    //  3. VARREDURA
    // =========================================================================

    /// Percorre todos os tenants. Cada violação é uma unidade de trabalho
    /// própria: a falha de uma não interrompe as demais.
    pub async fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        let candidates = match self.repo.list_sweep_candidates(&self.pool, now, SWEEP_BATCH).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(error = %e, "Varredura de SLA não conseguiu listar violações");
                return report;
            }
        };
        if candidates.is_empty() {
            return report;
        }

        let mut rule_ids: Vec<Uuid> = candidates.iter().map(|v| v.sla_rule_id).collect();
        rule_ids.sort_unstable();
        rule_ids.dedup();

        let rules: HashMap<Uuid, SlaRule> = match self.repo.find_rules_by_ids(&self.pool, &rule_ids).await {
            Ok(rules) => rules.into_iter().map(|r| (r.id, r)).collect(),
            Err(e) => {
                tracing::error!(error = %e, "Varredura de SLA não conseguiu carregar regras");
                return report;
            }
        };

        report.scanned = candidates.len();
        for violation in &candidates {
            // Regra apagada entre as duas leituras: o cascade levou a violação junto.
            let Some(rule) = rules.get(&violation.sla_rule_id) else {
                continue;
            };

            match self.process_violation(violation, rule, now).await {
                Ok(outcome) => {
                    report.breached += usize::from(outcome.breached);
                    report.escalated += usize::from(outcome.escalated);
                    report.reassigned += usize::from(outcome.reassigned);
                    report.notifications += outcome.notifications;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        tenant_id = %violation.tenant_id,
                        violation_id = %violation.id,
                        error = %e,
                        "Falha ao processar violação de SLA"
                    );
                }
            }
        }

        if report.breached + report.escalated + report.failed > 0 {
            tracing::info!(
                scanned = report.scanned,
                breached = report.breached,
                escalated = report.escalated,
                reassigned = report.reassigned,
                failed = report.failed,
                "Varredura de SLA concluída"
            );
        }

        report
    }

    async fn process_violation(
        &self,
        violation: &SlaViolation,
        rule: &SlaRule,
        now: DateTime<Utc>,
    ) -> Result<ItemOutcome, AppError> {
        let mut outcome = ItemOutcome::default();

        let escalate = match plan_violation(violation, rule, now) {
            SweepAction::Skip => return Ok(outcome),
            SweepAction::Escalate => true,
            SweepAction::Breach { minutes, escalate } => {
                // Update condicional: se outra varredura já marcou, não notificamos de novo.
                if !self.repo.mark_breached(&self.pool, violation.id, minutes).await? {
                    return Ok(outcome);
                }
                outcome.breached = true;

                let lead = self.lead_of(violation).await;
                let draft = NotificationDraft::about_lead(
                    NotificationKind::SlaViolated,
                    format!("SLA violado: {}", rule.name),
                    format!("Lead {} estourou o SLA em {} minutos", label_of(lead.as_ref(), violation.lead_id), minutes),
                    violation.lead_id,
                );
                outcome.notifications += self
                    .notifications
                    .notify_roles(violation.tenant_id, &rule.notify_roles, &draft)
                    .await;
                self.count_notification_round(violation.id).await;

                escalate
            }
        };

        if escalate {
            self.escalate(violation, rule, now, &mut outcome).await?;
        }

        Ok(outcome)
    }

    async fn escalate(
        &self,
        violation: &SlaViolation,
        rule: &SlaRule,
        now: DateTime<Utc>,
        outcome: &mut ItemOutcome,
    ) -> Result<(), AppError> {
        if !self.repo.mark_escalated(&self.pool, violation.id, now).await? {
            return Ok(());
        }
        outcome.escalated = true;

        let lead = self.lead_of(violation).await;

        if let Some(role) = rule.escalate_to_role {
            let draft = NotificationDraft::about_lead(
                NotificationKind::SlaEscalated,
                format!("SLA escalonado: {}", rule.name),
                format!("Lead {} precisa de atenção imediata", label_of(lead.as_ref(), violation.lead_id)),
                violation.lead_id,
            );
            outcome.notifications += self.notifications.notify_roles(violation.tenant_id, &[role], &draft).await;
            self.count_notification_round(violation.id).await;
        }

        if rule.auto_reassign {
            outcome.reassigned = self.auto_reassign(violation, rule, lead.as_ref()).await;
        }

        Ok(())
    }

    /// A transição já foi gravada: sem o lead, as notificações saem com o ID
    /// e a reatribuição é pulada, mas nada aborta.
    async fn lead_of(&self, violation: &SlaViolation) -> Option<Lead> {
        self.leads
            .find_by_id(&self.pool, violation.tenant_id, violation.lead_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(
                    violation_id = %violation.id,
                    lead_id = %violation.lead_id,
                    error = %e,
                    "Falha ao carregar o lead da violação"
                );
                None
            })
    }

    /// `notifications_sent` é apenas indicativo; falha aqui não desfaz a transição.
    async fn count_notification_round(&self, violation_id: Uuid) {
        if let Err(e) = self.repo.increment_notifications(&self.pool, violation_id).await {
            tracing::warn!(violation_id = %violation_id, error = %e, "Falha ao contar notificações da violação");
        }
    }

    /// Passa o lead para outro vendedor (nunca o atual). Qualquer desfecho
    /// sem troca fica registrado na timeline como SLA_AUTO_REASSIGN_SKIPPED.
    async fn auto_reassign(&self, violation: &SlaViolation, rule: &SlaRule, lead: Option<&Lead>) -> bool {
        let Some(lead) = lead else {
            tracing::warn!(violation_id = %violation.id, lead_id = %violation.lead_id, "Reatribuição automática pulada: lead indisponível");
            return false;
        };

        if lead.status.is_closed() {
            self.skip_reassign(lead, rule, "LEAD_CLOSED").await;
            return false;
        }

        let previous = lead.assigned_to_salesman_id;
        let outcome = self
            .assignment
            .auto_assign(lead.tenant_id, lead.id, previous, previous)
            .await;

        match outcome {
            Ok(AssignOutcome::Assigned(salesman)) => {
                self.record_event(
                    lead,
                    LeadEventKind::SlaAutoReassigned,
                    json!({
                        "fromSalesmanId": previous,
                        "toSalesmanId": salesman.id,
                        "slaRuleId": rule.id,
                        "violationId": violation.id,
                    }),
                )
                .await;

                let draft = NotificationDraft::about_lead(
                    NotificationKind::LeadAssigned,
                    "Lead reatribuído a você",
                    format!("{} foi reatribuído por estouro de SLA ({})", lead.display_label(), rule.name),
                    lead.id,
                );
                self.notifications.notify_salesman(lead.tenant_id, salesman.id, &draft).await;

                let mut snapshot = lead.snapshot();
                snapshot.assigned_to_salesman_id = Some(salesman.id);
                self.trigger(lead.tenant_id, SlaTrigger::LeadAssigned, &snapshot).await;

                tracing::info!(
                    tenant_id = %lead.tenant_id,
                    lead_id = %lead.id,
                    from = ?previous,
                    to = %salesman.id,
                    "Lead reatribuído pelo SLA"
                );
                true
            }
            Ok(AssignOutcome::NoEligibleSalesman) => {
                self.skip_reassign(lead, rule, "NO_ELIGIBLE_SALESMAN").await;
                false
            }
            Ok(AssignOutcome::LeadTaken) => {
                self.skip_reassign(lead, rule, "LEAD_TAKEN").await;
                false
            }
            Err(e) => {
                tracing::warn!(tenant_id = %lead.tenant_id, lead_id = %lead.id, error = %e, "Falha na reatribuição automática");
                self.skip_reassign(lead, rule, "ASSIGNMENT_FAILED").await;
                false
            }
        }
    }

    async fn skip_reassign(&self, lead: &Lead, rule: &SlaRule, reason: &str) {
        tracing::warn!(tenant_id = %lead.tenant_id, lead_id = %lead.id, reason, "Reatribuição automática não realizada");
        self.record_event(
            lead,
            LeadEventKind::SlaAutoReassignSkipped,
            json!({ "reason": reason, "slaRuleId": rule.id, "salesmanId": lead.assigned_to_salesman_id }),
        )
        .await;
    }

    async fn record_event(&self, lead: &Lead, kind: LeadEventKind, payload: Value) {
        if let Err(e) = self.leads.append_event(&self.pool, lead.tenant_id, lead.id, kind, payload).await {
            tracing::warn!(lead_id = %lead.id, event = kind.as_str(), error = %e, "Falha ao gravar evento do lead");
        }
    }

    // =========================================================================
    //  4. FECHAMENTO
    // =========================================================================

    /// PENDING -> RESPONDED. Estouros já registrados continuam visíveis.
    pub async fn mark_responded(&self, tenant_id: Uuid, lead_id: Uuid) -> Result<u64, AppError> {
        self.repo
            .mark_responded(&self.pool, tenant_id, lead_id, self.clock.now())
            .await
    }

    /// PENDING/BREACHED/ESCALATED -> RESOLVED (fechamento manual).
    pub async fn mark_resolved(&self, tenant_id: Uuid, lead_id: Uuid) -> Result<u64, AppError> {
        let resolved = self
            .repo
            .mark_resolved(&self.pool, tenant_id, lead_id, self.clock.now())
            .await?;
        tracing::info!(tenant_id = %tenant_id, lead_id = %lead_id, resolved, "Violações de SLA resolvidas");
        Ok(resolved)
    }

    // =========================================================================
    //  5. CONSULTAS
    // =========================================================================

    pub async fn lead_status(&self, tenant_id: Uuid, lead_id: Uuid) -> Result<LeadSlaStatus, AppError> {
        self.leads
            .find_by_id(&self.pool, tenant_id, lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;

        let violations = self.repo.list_for_lead(&self.pool, tenant_id, lead_id).await?;
        Ok(LeadSlaStatus::from_violations(violations))
    }

    pub async fn analytics(&self, tenant_id: Uuid, days: i64) -> Result<SlaAnalytics, AppError> {
        let since = self.clock.now() - Duration::days(days);
        let counts = self.repo.counts_since(&self.pool, tenant_id, since).await?;
        Ok(SlaAnalytics::from_counts(days, counts))
    }
}

fn label_of(lead: Option<&Lead>, lead_id: Uuid) -> String {
    lead.map(Lead::display_label).unwrap_or_else(|| lead_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::lead::{LeadChannel, LeadHeat, LeadStatus};
    use crate::models::notification::UserRole;
    use chrono::TimeZone;

    fn t(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, minute, 0).unwrap()
    }

    fn rule(trigger_on: SlaTrigger, response: i32, escalation: Option<i32>) -> SlaRule {
        SlaRule {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            name: "Primeira resposta".to_string(),
            description: None,
            trigger_on,
            lead_status: None,
            lead_heat: None,
            channel: None,
            response_time_minutes: response,
            escalation_time_minutes: escalation,
            notify_roles: vec![UserRole::Manager],
            escalate_to_role: None,
            auto_reassign: false,
            is_active: true,
            created_at: t(0, 0),
            updated_at: t(0, 0),
        }
    }

    fn snapshot() -> LeadSnapshot {
        LeadSnapshot {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            status: LeadStatus::New,
            heat: LeadHeat::Hot,
            channel: LeadChannel::Whatsapp,
            assigned_to_salesman_id: None,
        }
    }

    fn violation_for(rule: &SlaRule, triggered_at: DateTime<Utc>, status: SlaViolationStatus) -> SlaViolation {
        SlaViolation {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            sla_rule_id: rule.id,
            lead_id: Uuid::new_v4(),
            triggered_at,
            due_at: due_at(triggered_at, rule),
            status,
            breach_minutes: None,
            notifications_sent: 0,
            responded_at: None,
            resolved_at: None,
            escalated_at: None,
            created_at: triggered_at,
        }
    }

    #[test]
    fn due_time_is_exact_and_breach_starts_on_the_minute() {
        let r = rule(SlaTrigger::NewLead, 30, None);
        let v = violation_for(&r, t(9, 0), SlaViolationStatus::Pending);
        assert_eq!(v.due_at, t(9, 30));

        assert_eq!(plan_violation(&v, &r, t(9, 29)), SweepAction::Skip);
        assert_eq!(
            plan_violation(&v, &r, t(9, 30)),
            SweepAction::Breach { minutes: 0, escalate: false }
        );
    }

    #[test]
    fn one_hour_rule_without_escalation() {
        let r = rule(SlaTrigger::NewLead, 60, None);
        let mut v = violation_for(&r, t(9, 0), SlaViolationStatus::Pending);

        assert_eq!(plan_violation(&v, &r, t(9, 59)), SweepAction::Skip);
        assert_eq!(
            plan_violation(&v, &r, t(10, 0)),
            SweepAction::Breach { minutes: 0, escalate: false }
        );

        // Depois do estouro, nada muda: breach_minutes é a foto do primeiro estouro.
        v.status = SlaViolationStatus::Breached;
        v.breach_minutes = Some(0);
        assert_eq!(plan_violation(&v, &r, t(10, 5)), SweepAction::Skip);
    }

    #[test]
    fn breached_escalates_exactly_at_window() {
        let r = rule(SlaTrigger::NewLead, 30, Some(15));
        let v = violation_for(&r, t(9, 0), SlaViolationStatus::Breached);

        assert_eq!(plan_violation(&v, &r, t(9, 44)), SweepAction::Skip);
        assert_eq!(plan_violation(&v, &r, t(9, 45)), SweepAction::Escalate);
    }

    #[test]
    fn long_overdue_pending_breaches_and_escalates_in_one_pass() {
        let r = rule(SlaTrigger::NewLead, 30, Some(15));
        let v = violation_for(&r, t(9, 0), SlaViolationStatus::Pending);

        assert_eq!(
            plan_violation(&v, &r, t(9, 50)),
            SweepAction::Breach { minutes: 20, escalate: true }
        );
    }

    #[test]
    fn closed_violations_are_never_swept() {
        let r = rule(SlaTrigger::NewLead, 5, Some(1));
        for status in [
            SlaViolationStatus::Responded,
            SlaViolationStatus::Resolved,
            SlaViolationStatus::Escalated,
        ] {
            let v = violation_for(&r, t(9, 0), status);
            assert_eq!(plan_violation(&v, &r, t(18, 0)), SweepAction::Skip, "{status:?}");
        }
    }

    #[test]
    fn breach_minutes_floor() {
        let due = t(10, 0);
        assert_eq!(breach_minutes(due + Duration::seconds(59), due), 0);
        assert_eq!(breach_minutes(due + Duration::seconds(61), due), 1);
        assert_eq!(breach_minutes(due - Duration::minutes(3), due), 0);
    }

    #[test]
    fn two_matching_rules_fan_out() {
        let rules = vec![
            rule(SlaTrigger::NewLead, 30, None),
            rule(SlaTrigger::NewLead, 120, Some(30)),
            rule(SlaTrigger::MessageReceived, 10, None),
        ];
        let matched = matching_rules(&rules, SlaTrigger::NewLead, &snapshot());
        assert_eq!(matched.len(), 2);

        let now = t(9, 0);
        let dues: Vec<_> = matched.iter().map(|r| due_at(now, r)).collect();
        assert_eq!(dues, vec![t(9, 30), t(11, 0)]);
    }

    #[test]
    fn filters_must_all_match() {
        let lead = snapshot();

        let mut by_heat = rule(SlaTrigger::NewLead, 30, None);
        by_heat.lead_heat = Some(LeadHeat::Hot);
        assert!(rule_applies(&by_heat, &lead));

        by_heat.channel = Some(LeadChannel::Email);
        assert!(!rule_applies(&by_heat, &lead));

        let mut by_status = rule(SlaTrigger::NewLead, 30, None);
        by_status.lead_status = Some(LeadStatus::Won);
        assert!(!rule_applies(&by_status, &lead));
    }

    #[test]
    fn inactive_rules_never_match() {
        let mut r = rule(SlaTrigger::NewLead, 30, None);
        r.is_active = false;
        assert!(matching_rules(std::slice::from_ref(&r), SlaTrigger::NewLead, &snapshot()).is_empty());
    }
}

#[cfg(test)]
mod storage_tests {
    use sqlx::PgPool;

    use super::*;
    use crate::common::clock::FixedClock;
    use crate::common::test_fixtures::{self as fx, at};
    use crate::models::lead::LeadHeat;
    use crate::models::notification::UserRole;

    fn new_rule(response: i32, escalation: Option<i32>) -> NewSlaRule {
        NewSlaRule {
            name: "Primeira resposta".to_string(),
            description: None,
            trigger_on: SlaTrigger::NewLead,
            lead_status: None,
            lead_heat: None,
            channel: None,
            response_time_minutes: response,
            escalation_time_minutes: escalation,
            notify_roles: vec![UserRole::Manager],
            escalate_to_role: None,
            auto_reassign: false,
        }
    }

    async fn violations_of(pool: &PgPool, lead_id: Uuid) -> Vec<SlaViolation> {
        sqlx::query_as::<_, SlaViolation>("SELECT * FROM sla_violations WHERE lead_id = $1 ORDER BY due_at")
            .bind(lead_id)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn two_matching_rules_open_two_violations(pool: PgPool) {
        let clock = FixedClock::at(at(9, 0));
        let app = fx::app(&pool, &clock);
        let tenant = fx::tenant(&pool).await;
        let engine = &app.sla_engine;

        engine.create_rule(tenant, &new_rule(30, None)).await.unwrap();
        engine.create_rule(tenant, &new_rule(120, Some(30))).await.unwrap();
        let mut other = new_rule(5, None);
        other.trigger_on = SlaTrigger::MessageReceived;
        engine.create_rule(tenant, &other).await.unwrap();

        let lead = fx::lead(&pool, tenant, LeadHeat::Hot, None).await;
        assert_eq!(engine.trigger(tenant, SlaTrigger::NewLead, &lead.snapshot()).await, 2);

        let rows = violations_of(&pool, lead.id).await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|v| v.status == SlaViolationStatus::Pending));
        assert_eq!(rows[0].due_at, at(9, 30));
        assert_eq!(rows[1].due_at, at(11, 0));
    }

    #[sqlx::test]
    async fn sweep_breaches_and_escalates_once_notifying_active_managers(pool: PgPool) {
        let clock = FixedClock::at(at(9, 0));
        let app = fx::app(&pool, &clock);
        let tenant = fx::tenant(&pool).await;
        fx::user(&pool, tenant, UserRole::Manager, true).await;
        fx::user(&pool, tenant, UserRole::Manager, true).await;
        fx::user(&pool, tenant, UserRole::Manager, false).await;
        fx::user(&pool, tenant, UserRole::Admin, true).await;

        let engine = &app.sla_engine;
        engine.create_rule(tenant, &new_rule(30, Some(15))).await.unwrap();
        let lead = fx::lead(&pool, tenant, LeadHeat::Hot, None).await;
        engine.trigger(tenant, SlaTrigger::NewLead, &lead.snapshot()).await;

        clock.set(at(9, 29));
        let early = engine.sweep().await;
        assert_eq!(early.breached, 0);
        assert_eq!(violations_of(&pool, lead.id).await[0].status, SlaViolationStatus::Pending);

        clock.set(at(9, 50));
        let report = engine.sweep().await;
        assert_eq!((report.breached, report.escalated, report.failed), (1, 1, 0));

        let v = &violations_of(&pool, lead.id).await[0];
        assert_eq!(v.status, SlaViolationStatus::Escalated);
        assert_eq!(v.breach_minutes, Some(20));
        assert_eq!(v.escalated_at, Some(at(9, 50)));
        assert_eq!(v.notifications_sent, 1);
        assert_eq!(fx::notifications_of(&pool, "SLA_VIOLATED").await, 2);

        clock.set(at(9, 55));
        let again = engine.sweep().await;
        assert_eq!((again.scanned, again.breached, again.escalated), (0, 0, 0));
        assert_eq!(fx::notifications_of(&pool, "SLA_VIOLATED").await, 2);
    }

    #[sqlx::test]
    async fn breach_is_marked_only_once(pool: PgPool) {
        let clock = FixedClock::at(at(9, 0));
        let app = fx::app(&pool, &clock);
        let tenant = fx::tenant(&pool).await;
        app.sla_engine.create_rule(tenant, &new_rule(30, None)).await.unwrap();
        let lead = fx::lead(&pool, tenant, LeadHeat::Warm, None).await;
        app.sla_engine.trigger(tenant, SlaTrigger::NewLead, &lead.snapshot()).await;

        let id = violations_of(&pool, lead.id).await[0].id;
        let repo = SlaRepository::new(pool.clone());
        assert!(repo.mark_breached(&pool, id, 3).await.unwrap());
        assert!(!repo.mark_breached(&pool, id, 9).await.unwrap());
        assert_eq!(violations_of(&pool, lead.id).await[0].breach_minutes, Some(3));
    }

    #[sqlx::test]
    async fn responded_violation_leaves_the_sweep(pool: PgPool) {
        let clock = FixedClock::at(at(9, 0));
        let app = fx::app(&pool, &clock);
        let tenant = fx::tenant(&pool).await;
        app.sla_engine.create_rule(tenant, &new_rule(30, Some(15))).await.unwrap();
        let lead = fx::lead(&pool, tenant, LeadHeat::Warm, None).await;
        app.sla_engine.trigger(tenant, SlaTrigger::NewLead, &lead.snapshot()).await;

        clock.set(at(9, 10));
        assert_eq!(app.sla_engine.mark_responded(tenant, lead.id).await.unwrap(), 1);

        clock.set(at(12, 0));
        let report = app.sla_engine.sweep().await;
        assert_eq!(report.scanned, 0);

        let v = &violations_of(&pool, lead.id).await[0];
        assert_eq!(v.status, SlaViolationStatus::Responded);
        assert_eq!(v.responded_at, Some(at(9, 10)));
    }

    #[sqlx::test]
    async fn escalation_reassigns_to_someone_else(pool: PgPool) {
        let clock = FixedClock::at(at(9, 0));
        let app = fx::app(&pool, &clock);
        let tenant = fx::tenant(&pool).await;
        let owner = fx::salesman(&pool, tenant, 100, 0).await;
        let other = fx::salesman(&pool, tenant, 10, 0).await;

        let mut rule = new_rule(30, Some(15));
        rule.auto_reassign = true;
        app.sla_engine.create_rule(tenant, &rule).await.unwrap();

        let lead = fx::lead(&pool, tenant, LeadHeat::Hot, Some(owner)).await;
        app.sla_engine.trigger(tenant, SlaTrigger::NewLead, &lead.snapshot()).await;

        clock.set(at(9, 50));
        let report = app.sla_engine.sweep().await;
        assert_eq!(report.reassigned, 1);

        let leads = LeadRepository::new(pool.clone());
        let current = leads.find_by_id(&pool, tenant, lead.id).await.unwrap().unwrap();
        assert_eq!(current.assigned_to_salesman_id, Some(other));

        let events: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lead_events WHERE lead_id = $1 AND event_type = 'SLA_AUTO_REASSIGNED'",
        )
        .bind(lead.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(events, 1);
    }

    #[sqlx::test]
    async fn lead_lookup_failure_does_not_swallow_escalation(pool: PgPool) {
        let clock = FixedClock::at(at(9, 0));
        let app = fx::app(&pool, &clock);
        let tenant = fx::tenant(&pool).await;
        fx::user(&pool, tenant, UserRole::Manager, true).await;

        let mut rule = new_rule(30, Some(15));
        rule.escalate_to_role = Some(UserRole::Manager);
        rule.auto_reassign = true;
        app.sla_engine.create_rule(tenant, &rule).await.unwrap();

        let lead = fx::lead(&pool, tenant, LeadHeat::Hot, None).await;
        app.sla_engine.trigger(tenant, SlaTrigger::NewLead, &lead.snapshot()).await;

        // Leitura de leads passa a falhar; as violações continuam acessíveis.
        sqlx::query("ALTER TABLE leads RENAME TO leads_offline")
            .execute(&pool)
            .await
            .unwrap();

        clock.set(at(9, 50));
        let report = app.sla_engine.sweep().await;
        assert_eq!((report.breached, report.escalated, report.failed), (1, 1, 0));
        assert_eq!(report.reassigned, 0);

        assert_eq!(fx::notifications_of(&pool, "SLA_VIOLATED").await, 1);
        assert_eq!(fx::notifications_of(&pool, "SLA_ESCALATED").await, 1);

        let v = &violations_of(&pool, lead.id).await[0];
        assert_eq!(v.status, SlaViolationStatus::Escalated);
        assert_eq!(v.notifications_sent, 2);
    }
}
