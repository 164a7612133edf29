// src/handlers/sla.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    handlers::salesmen::WindowQuery,
    middleware::tenancy::TenantContext,
    models::{
        lead::{LeadChannel, LeadHeat, LeadStatus},
        notification::UserRole,
        sla::{NewSlaRule, SlaAnalytics, SlaRule, SlaTrigger},
    },
    services::sla_service::SweepReport,
};

const DEFAULT_ANALYTICS_DAYS: i64 = 30;

// =============================================================================
//  REGRAS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlaRulePayload {
    #[validate(length(min = 1, max = 120, message = "O nome é obrigatório"))]
    #[schema(example = "Primeira resposta em 30 min")]
    pub name: String,

    #[validate(length(max = 500, message = "Descrição muito longa"))]
    pub description: Option<String>,

    #[schema(example = "NEW_LEAD")]
    pub trigger_on: SlaTrigger,

    pub lead_status: Option<LeadStatus>,
    pub lead_heat: Option<LeadHeat>,
    pub channel: Option<LeadChannel>,

    #[validate(range(min = 1, max = 43200, message = "O tempo de resposta deve ser positivo"))]
    #[schema(example = 30)]
    pub response_time_minutes: i32,

    #[validate(range(min = 1, max = 43200, message = "O tempo de escalonamento deve ser positivo"))]
    pub escalation_time_minutes: Option<i32>,

    #[serde(default)]
    pub notify_roles: Vec<UserRole>,

    pub escalate_to_role: Option<UserRole>,

    #[serde(default)]
    pub auto_reassign: bool,
}

impl From<CreateSlaRulePayload> for NewSlaRule {
    fn from(p: CreateSlaRulePayload) -> Self {
        let mut notify_roles: Vec<UserRole> = Vec::with_capacity(p.notify_roles.len());
        for role in p.notify_roles {
            if !notify_roles.contains(&role) {
                notify_roles.push(role);
            }
        }

        NewSlaRule {
            name: p.name.trim().to_string(),
            description: p.description,
            trigger_on: p.trigger_on,
            lead_status: p.lead_status,
            lead_heat: p.lead_heat,
            channel: p.channel,
            response_time_minutes: p.response_time_minutes,
            escalation_time_minutes: p.escalation_time_minutes,
            notify_roles,
            escalate_to_role: p.escalate_to_role,
            auto_reassign: p.auto_reassign,
        }
    }
}

// POST /api/sla/rules
#[utoipa::path(
    post,
    path = "/api/sla/rules",
    tag = "SLA",
    request_body = CreateSlaRulePayload,
    responses(
        (status = 201, description = "Regra criada", body = SlaRule),
        (status = 400, description = "Dados inválidos")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant")
    )
)]
pub async fn create_rule(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateSlaRulePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate().map_err(AppError::from)?;

    let rule = app_state
        .sla_engine
        .create_rule(tenant.0, &payload.into())
        .await?;

    Ok((StatusCode::CREATED, Json(rule)))
}

// GET /api/sla/rules
#[utoipa::path(
    get,
    path = "/api/sla/rules",
    tag = "SLA",
    responses(
        (status = 200, description = "Regras do tenant", body = Vec<SlaRule>)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant")
    )
)]
pub async fn list_rules(
    State(app_state): State<AppState>,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let rules = app_state.sla_engine.list_rules(tenant.0).await?;
    Ok((StatusCode::OK, Json(rules)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetRuleActivePayload {
    pub is_active: bool,
}

// PATCH /api/sla/rules/{id}
#[utoipa::path(
    patch,
    path = "/api/sla/rules/{id}",
    tag = "SLA",
    request_body = SetRuleActivePayload,
    responses(
        (status = 200, description = "Regra atualizada", body = SlaRule),
        (status = 404, description = "Regra não encontrada")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        ("id" = Uuid, Path, description = "ID da Regra")
    )
)]
pub async fn set_rule_active(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(rule_id): Path<Uuid>,
    Json(payload): Json<SetRuleActivePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = app_state
        .sla_engine
        .set_rule_active(tenant.0, rule_id, payload.is_active)
        .await?;

    Ok((StatusCode::OK, Json(rule)))
}

// =============================================================================
//  MONITORAMENTO
// =============================================================================

// GET /api/sla/analytics
#[utoipa::path(
    get,
    path = "/api/sla/analytics",
    tag = "SLA",
    responses(
        (status = 200, description = "Indicadores de SLA da janela", body = SlaAnalytics)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        WindowQuery
    )
)]
pub async fn analytics(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query.validate().map_err(AppError::from)?;

    let days = query.days.unwrap_or(DEFAULT_ANALYTICS_DAYS);
    let report = app_state.sla_engine.analytics(tenant.0, days).await?;

    Ok((StatusCode::OK, Json(report)))
}

// POST /api/sla/sweep
// Roda a varredura na hora (todos os tenants), sem esperar o agendador.
#[utoipa::path(
    post,
    path = "/api/sla/sweep",
    tag = "SLA",
    responses(
        (status = 200, description = "Resultado da varredura", body = SweepReport)
    )
)]
pub async fn run_sweep(State(app_state): State<AppState>) -> impl IntoResponse {
    let report = app_state.sla_engine.sweep().await;
    (StatusCode::OK, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_payload_defaults_and_validation() {
        let payload: CreateSlaRulePayload = serde_json::from_value(json!({
            "name": "  Resposta rápida ",
            "triggerOn": "NEW_LEAD",
            "leadHeat": "HOT",
            "responseTimeMinutes": 15
        }))
        .unwrap();
        assert!(payload.validate().is_ok());

        let rule: NewSlaRule = payload.into();
        assert_eq!(rule.name, "Resposta rápida");
        assert!(rule.notify_roles.is_empty());
        assert!(!rule.auto_reassign);
        assert_eq!(rule.lead_heat, Some(LeadHeat::Hot));
    }

    #[test]
    fn non_positive_times_are_rejected() {
        let payload: CreateSlaRulePayload = serde_json::from_value(json!({
            "name": "Quebrada",
            "triggerOn": "MESSAGE_RECEIVED",
            "responseTimeMinutes": 0,
            "escalationTimeMinutes": -5
        }))
        .unwrap();
        assert_eq!(payload.validate().unwrap_err().field_errors().len(), 2);
    }

    #[test]
    fn unknown_roles_fail_to_parse() {
        let parsed = serde_json::from_value::<CreateSlaRulePayload>(json!({
            "name": "Typo",
            "triggerOn": "NEW_LEAD",
            "responseTimeMinutes": 10,
            "notifyRoles": ["MANGER"]
        }));
        assert!(parsed.is_err());
    }
}
