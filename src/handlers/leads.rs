// src/handlers/leads.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::tenancy::TenantContext,
    models::{
        lead::{Lead, LeadChannel, LeadEvent, LeadStatus, Message},
        salesman::{SuccessEvent, SuccessEventType},
        sla::LeadSlaStatus,
        triage::{IngestOutcome, InboundMessage},
    },
};

// =============================================================================
//  ÁREA 1: INGESTÃO
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestMessagePayload {
    #[schema(example = "WHATSAPP")]
    pub channel: LeadChannel,

    #[validate(length(min = 1, max = 200, message = "Identificador externo inválido"))]
    pub external_id: Option<String>,

    #[validate(length(max = 200, message = "Nome muito longo"))]
    #[schema(example = "Fatima Al Zahra")]
    pub full_name: Option<String>,

    #[validate(length(min = 5, max = 32, message = "Telefone inválido"))]
    #[schema(example = "+971500000000")]
    pub phone: Option<String>,

    #[validate(email(message = "E-mail inválido"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 4000, message = "A mensagem do cliente é obrigatória"))]
    #[schema(example = "Hi, what is the delivery time for 20 units?")]
    pub customer_message: String,
}

impl From<IngestMessagePayload> for InboundMessage {
    fn from(p: IngestMessagePayload) -> Self {
        InboundMessage {
            channel: p.channel,
            external_id: p.external_id,
            full_name: p.full_name,
            phone: p.phone,
            email: p.email,
            body: p.customer_message,
        }
    }
}

// POST /api/ingest/message
#[utoipa::path(
    post,
    path = "/api/ingest/message",
    tag = "Leads",
    request_body = IngestMessagePayload,
    responses(
        (status = 200, description = "Mensagem triada", body = IngestOutcome),
        (status = 400, description = "Dados inválidos"),
        (status = 502, description = "Gateway de IA indisponível")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant")
    )
)]
pub async fn ingest_message(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<IngestMessagePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate().map_err(AppError::from)?;

    let outcome = app_state
        .triage_orchestrator
        .ingest(tenant.0, &payload.into())
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

// =============================================================================
//  ÁREA 2: AÇÕES SOBRE O LEAD
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPayload {
    #[validate(length(min = 1, max = 4000, message = "A resposta não pode ser vazia"))]
    pub body: String,
}

// POST /api/leads/{id}/reply
#[utoipa::path(
    post,
    path = "/api/leads/{id}/reply",
    tag = "Leads",
    request_body = ReplyPayload,
    responses(
        (status = 201, description = "Resposta registrada", body = Message),
        (status = 404, description = "Lead não encontrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        ("id" = Uuid, Path, description = "ID do Lead")
    )
)]
pub async fn send_reply(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<ReplyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate().map_err(AppError::from)?;

    let message = app_state
        .lead_service
        .send_reply(tenant.0, lead_id, &payload.body)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignLeadPayload {
    /// `null` remove o responsável.
    pub salesman_id: Option<Uuid>,
}

// POST /api/leads/{id}/assign
#[utoipa::path(
    post,
    path = "/api/leads/{id}/assign",
    tag = "Leads",
    request_body = AssignLeadPayload,
    responses(
        (status = 200, description = "Lead atribuído", body = Lead),
        (status = 404, description = "Lead ou vendedor não encontrado"),
        (status = 409, description = "Responsável alterado em paralelo")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        ("id" = Uuid, Path, description = "ID do Lead")
    )
)]
pub async fn assign_lead(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<AssignLeadPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = app_state
        .lead_service
        .assign_manually(tenant.0, lead_id, payload.salesman_id)
        .await?;

    Ok((StatusCode::OK, Json(lead)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusPayload {
    #[schema(example = "QUALIFIED")]
    pub status: LeadStatus,
}

// POST /api/leads/{id}/status
#[utoipa::path(
    post,
    path = "/api/leads/{id}/status",
    tag = "Leads",
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status atualizado", body = Lead),
        (status = 404, description = "Lead não encontrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        ("id" = Uuid, Path, description = "ID do Lead")
    )
)]
pub async fn update_status(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = app_state
        .lead_service
        .update_status(tenant.0, lead_id, payload.status)
        .await?;

    Ok((StatusCode::OK, Json(lead)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordSuccessPayload {
    #[schema(example = "ORDER_RECEIVED")]
    pub event_type: SuccessEventType,

    #[validate(range(min = 0.0, max = 1000.0, message = "O peso deve estar entre 0 e 1000"))]
    #[schema(example = 10.0)]
    pub weight: f64,

    #[validate(length(max = 1000, message = "Observação muito longa"))]
    pub note: Option<String>,
}

// POST /api/leads/{id}/success
#[utoipa::path(
    post,
    path = "/api/leads/{id}/success",
    tag = "Leads",
    request_body = RecordSuccessPayload,
    responses(
        (status = 201, description = "Evento de sucesso registrado", body = SuccessEvent),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Lead não encontrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        ("id" = Uuid, Path, description = "ID do Lead")
    )
)]
pub async fn record_success(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<RecordSuccessPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate().map_err(AppError::from)?;

    let event = app_state
        .scoring_service
        .record_success(tenant.0, lead_id, payload.event_type, payload.weight, payload.note.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(event)))
}

// GET /api/leads/{id}/events
#[utoipa::path(
    get,
    path = "/api/leads/{id}/events",
    tag = "Leads",
    responses(
        (status = 200, description = "Timeline do lead", body = Vec<LeadEvent>),
        (status = 404, description = "Lead não encontrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        ("id" = Uuid, Path, description = "ID do Lead")
    )
)]
pub async fn list_events(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let events = app_state.lead_service.timeline(tenant.0, lead_id).await?;
    Ok((StatusCode::OK, Json(events)))
}

// =============================================================================
//  ÁREA 3: SLA DO LEAD
// =============================================================================

// GET /api/leads/{id}/sla
#[utoipa::path(
    get,
    path = "/api/leads/{id}/sla",
    tag = "Leads",
    responses(
        (status = 200, description = "Violações de SLA do lead", body = LeadSlaStatus),
        (status = 404, description = "Lead não encontrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        ("id" = Uuid, Path, description = "ID do Lead")
    )
)]
pub async fn get_lead_sla(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let status = app_state.sla_engine.lead_status(tenant.0, lead_id).await?;
    Ok((StatusCode::OK, Json(status)))
}

// POST /api/leads/{id}/sla/resolve
#[utoipa::path(
    post,
    path = "/api/leads/{id}/sla/resolve",
    tag = "Leads",
    responses(
        (status = 200, description = "Violações abertas resolvidas"),
        (status = 404, description = "Lead não encontrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        ("id" = Uuid, Path, description = "ID do Lead")
    )
)]
pub async fn resolve_lead_sla(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let resolved = app_state.lead_service.resolve_sla(tenant.0, lead_id).await?;
    Ok((StatusCode::OK, Json(json!({ "resolved": resolved }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_payload_maps_to_inbound_message() {
        let payload: IngestMessagePayload = serde_json::from_value(json!({
            "channel": "WHATSAPP",
            "externalId": "wa-123",
            "phone": "+971500000000",
            "customerMessage": "Need a quote today"
        }))
        .unwrap();
        assert!(payload.validate().is_ok());

        let inbound: InboundMessage = payload.into();
        assert_eq!(inbound.channel, LeadChannel::Whatsapp);
        assert_eq!(inbound.external_id.as_deref(), Some("wa-123"));
        assert_eq!(inbound.body, "Need a quote today");
        assert!(inbound.email.is_none());
    }

    #[test]
    fn empty_message_and_bad_email_are_rejected() {
        let payload: IngestMessagePayload = serde_json::from_value(json!({
            "channel": "EMAIL",
            "email": "not-an-email",
            "customerMessage": ""
        }))
        .unwrap();
        let errors = payload.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 2);
    }

    #[test]
    fn success_weight_is_bounded() {
        let payload = RecordSuccessPayload {
            event_type: SuccessEventType::Custom,
            weight: 1500.0,
            note: None,
        };
        assert!(payload.validate().is_err());
    }
}
