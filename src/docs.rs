// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Leads ---
        handlers::leads::ingest_message,
        handlers::leads::send_reply,
        handlers::leads::assign_lead,
        handlers::leads::update_status,
        handlers::leads::record_success,
        handlers::leads::list_events,
        handlers::leads::get_lead_sla,
        handlers::leads::resolve_lead_sla,

        // --- Salesmen ---
        handlers::salesmen::recompute_scores,
        handlers::salesmen::leaderboard,
        handlers::salesmen::preview_pick,

        // --- SLA ---
        handlers::sla::create_rule,
        handlers::sla::list_rules,
        handlers::sla::set_rule_active,
        handlers::sla::analytics,
        handlers::sla::run_sweep,
    ),
    components(
        schemas(
            // --- Leads ---
            models::lead::LeadStatus,
            models::lead::LeadHeat,
            models::lead::LeadChannel,
            models::lead::MessageDirection,
            models::lead::Lead,
            models::lead::Message,
            models::lead::LeadEvent,
            models::triage::TriageResult,
            models::triage::ReplyDraft,
            models::triage::IngestOutcome,

            // --- Salesmen ---
            models::salesman::Salesman,
            models::salesman::ScoreUpdate,
            models::salesman::LeaderboardEntry,
            models::salesman::SuccessEventType,
            models::salesman::SuccessEvent,

            // --- SLA ---
            models::notification::UserRole,
            models::sla::SlaTrigger,
            models::sla::SlaViolationStatus,
            models::sla::SlaRule,
            models::sla::SlaViolation,
            models::sla::LeadSlaStatus,
            models::sla::SlaAnalytics,
            services::sla_service::SweepReport,

            // --- Payloads ---
            handlers::leads::IngestMessagePayload,
            handlers::leads::ReplyPayload,
            handlers::leads::AssignLeadPayload,
            handlers::leads::UpdateStatusPayload,
            handlers::leads::RecordSuccessPayload,
            handlers::sla::CreateSlaRulePayload,
            handlers::sla::SetRuleActivePayload,
        )
    ),
    tags(
        (name = "Leads", description = "Ingestão, resposta e atribuição de leads"),
        (name = "Salesmen", description = "Scores, ranking e roteamento de vendedores"),
        (name = "SLA", description = "Regras, violações e indicadores de SLA")
    )
)]
pub struct ApiDoc;
