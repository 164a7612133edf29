// src/models/sla.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::lead::{LeadChannel, LeadHeat, LeadStatus};
use crate::models::notification::UserRole;

// --- ENUMS ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "sla_trigger", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaTrigger {
    NewLead,
    MessageReceived,
    TriageEscalated,
    LeadAssigned,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "sla_violation_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaViolationStatus {
    Pending,
    Breached,
    Escalated,
    Responded,
    Resolved,
}

impl SlaViolationStatus {
    /// Tabela de transições do ciclo de vida. Nunca volta para PENDING.
    pub fn can_transition_to(self, next: SlaViolationStatus) -> bool {
        use SlaViolationStatus::*;
        matches!(
            (self, next),
            (Pending, Responded)
                | (Pending, Breached)
                | (Pending, Resolved)
                | (Breached, Escalated)
                | (Breached, Resolved)
                | (Escalated, Resolved)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SlaViolationStatus::Responded | SlaViolationStatus::Resolved)
    }
}

// --- REGRA (configuração do tenant) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlaRule {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub trigger_on: SlaTrigger,

    // Filtros opcionais: None casa com qualquer valor
    pub lead_status: Option<LeadStatus>,
    pub lead_heat: Option<LeadHeat>,
    pub channel: Option<LeadChannel>,

    pub response_time_minutes: i32,
    pub escalation_time_minutes: Option<i32>,
    pub notify_roles: Vec<UserRole>,
    pub escalate_to_role: Option<UserRole>,
    pub auto_reassign: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entrada já validada para criar uma regra.
#[derive(Debug, Clone)]
pub struct NewSlaRule {
    pub name: String,
    pub description: Option<String>,
    pub trigger_on: SlaTrigger,
    pub lead_status: Option<LeadStatus>,
    pub lead_heat: Option<LeadHeat>,
    pub channel: Option<LeadChannel>,
    pub response_time_minutes: i32,
    pub escalation_time_minutes: Option<i32>,
    pub notify_roles: Vec<UserRole>,
    pub escalate_to_role: Option<UserRole>,
    pub auto_reassign: bool,
}

// --- VIOLAÇÃO (instância de obrigação) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlaViolation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub sla_rule_id: Uuid,
    pub lead_id: Uuid,
    pub triggered_at: DateTime<Utc>,

    // Fixado na criação, nunca recalculado
    pub due_at: DateTime<Utc>,

    pub status: SlaViolationStatus,

    // Foto tirada no momento da primeira detecção do estouro
    pub breach_minutes: Option<i32>,

    pub notifications_sent: i32,
    pub responded_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// --- LEITURAS ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadSlaStatus {
    pub total: usize,
    pub active: usize,
    pub breached: usize,
    pub resolved: usize,
    pub violations: Vec<SlaViolation>,
}

impl LeadSlaStatus {
    pub fn from_violations(violations: Vec<SlaViolation>) -> Self {
        let count = |pred: fn(SlaViolationStatus) -> bool| {
            violations.iter().filter(|v| pred(v.status)).count()
        };

        Self {
            total: violations.len(),
            active: count(|s| !s.is_terminal()),
            breached: count(|s| matches!(s, SlaViolationStatus::Breached | SlaViolationStatus::Escalated)),
            resolved: count(|s| s.is_terminal()),
            violations,
        }
    }
}

/// Contagens cruas da janela, vindas de uma única query agregada.
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct SlaCounts {
    pub total: i64,
    pub pending: i64,
    pub breached: i64,
    pub escalated: i64,
    pub resolved: i64,
    pub avg_breach_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlaAnalytics {
    pub days: i64,
    pub total: i64,
    pub pending: i64,
    pub breached: i64,
    pub escalated: i64,
    pub resolved: i64,
    pub compliance_rate: f64,
    pub breach_rate: f64,
    pub avg_breach_time_minutes: f64,
}

impl SlaAnalytics {
    pub fn from_counts(days: i64, c: SlaCounts) -> Self {
        let pct = |n: i64| ((n as f64 / c.total as f64) * 1000.0).round() / 10.0;
        let (compliance_rate, breach_rate) = if c.total > 0 {
            (pct(c.resolved), pct(c.breached + c.escalated))
        } else {
            (100.0, 0.0)
        };

        Self {
            days,
            total: c.total,
            pending: c.pending,
            breached: c.breached,
            escalated: c.escalated,
            resolved: c.resolved,
            compliance_rate,
            breach_rate,
            avg_breach_time_minutes: c.avg_breach_minutes.unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SlaViolationStatus::*;

    const ALL: [SlaViolationStatus; 5] = [Pending, Breached, Escalated, Responded, Resolved];

    #[test]
    fn nothing_transitions_back_to_pending() {
        for s in ALL {
            assert!(!s.can_transition_to(Pending), "{s:?} -> PENDING");
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [Responded, Resolved] {
            assert!(from.is_terminal());
            for to in ALL {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn breached_can_only_escalate_or_resolve() {
        assert!(Breached.can_transition_to(Escalated));
        assert!(Breached.can_transition_to(Resolved));
        assert!(!Breached.can_transition_to(Responded));
        assert!(Escalated.can_transition_to(Resolved));
        assert!(!Escalated.can_transition_to(Breached));
        assert!(!Pending.can_transition_to(Escalated));
    }

    fn violation(status: SlaViolationStatus) -> SlaViolation {
        let now = Utc::now();
        SlaViolation {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            sla_rule_id: Uuid::nil(),
            lead_id: Uuid::nil(),
            triggered_at: now,
            due_at: now,
            status,
            breach_minutes: None,
            notifications_sent: 0,
            responded_at: None,
            resolved_at: None,
            escalated_at: None,
            created_at: now,
        }
    }

    #[test]
    fn lead_status_counts_by_bucket() {
        let status = LeadSlaStatus::from_violations(vec![
            violation(Pending),
            violation(Breached),
            violation(Escalated),
            violation(Responded),
            violation(Resolved),
        ]);
        assert_eq!(status.total, 5);
        assert_eq!(status.active, 3);
        assert_eq!(status.breached, 2);
        assert_eq!(status.resolved, 2);
    }

    #[test]
    fn analytics_on_empty_window_is_fully_compliant() {
        let a = SlaAnalytics::from_counts(30, SlaCounts::default());
        assert_eq!(a.compliance_rate, 100.0);
        assert_eq!(a.breach_rate, 0.0);
        assert_eq!(a.avg_breach_time_minutes, 0.0);
    }

    #[test]
    fn analytics_rates_round_to_one_decimal() {
        let a = SlaAnalytics::from_counts(
            7,
            SlaCounts {
                total: 3,
                pending: 1,
                breached: 1,
                escalated: 0,
                resolved: 1,
                avg_breach_minutes: Some(12.5),
            },
        );
        assert_eq!(a.compliance_rate, 33.3);
        assert_eq!(a.breach_rate, 33.3);
        assert_eq!(a.avg_breach_time_minutes, 12.5);
    }
}
