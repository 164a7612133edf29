// src/handlers/salesmen.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::tenancy::TenantContext,
    models::salesman::{LeaderboardEntry, ScoreUpdate},
};

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct WindowQuery {
    /// Janela em dias (padrão: configuração do servidor).
    #[validate(range(min = 1, max = 365, message = "A janela deve ter entre 1 e 365 dias"))]
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PickQuery {
    /// Semente da escolha; normalmente o ID do lead.
    pub seed: Option<String>,
}

// POST /api/salesmen/recompute
#[utoipa::path(
    post,
    path = "/api/salesmen/recompute",
    tag = "Salesmen",
    responses(
        (status = 200, description = "Scores recalculados", body = Vec<ScoreUpdate>)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        WindowQuery
    )
)]
pub async fn recompute_scores(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query.validate().map_err(AppError::from)?;

    let days = query
        .days
        .unwrap_or_else(|| app_state.scoring_service.default_lookback_days());
    let updates = app_state.scoring_service.recompute(tenant.0, days).await?;

    Ok((StatusCode::OK, Json(updates)))
}

// GET /api/salesmen/leaderboard
#[utoipa::path(
    get,
    path = "/api/salesmen/leaderboard",
    tag = "Salesmen",
    responses(
        (status = 200, description = "Top 10 da janela", body = Vec<LeaderboardEntry>)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        WindowQuery
    )
)]
pub async fn leaderboard(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query.validate().map_err(AppError::from)?;

    let days = query
        .days
        .unwrap_or_else(|| app_state.scoring_service.default_lookback_days());
    let entries = app_state.scoring_service.leaderboard(tenant.0, days).await?;

    Ok((StatusCode::OK, Json(entries)))
}

// GET /api/salesmen/pick
#[utoipa::path(
    get,
    path = "/api/salesmen/pick",
    tag = "Salesmen",
    responses(
        (status = 200, description = "Semente usada e o vendedor que seria escolhido (ou null); nada é gravado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Tenant"),
        PickQuery
    )
)]
pub async fn preview_pick(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<PickQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let seed = query.seed.unwrap_or_else(|| Uuid::new_v4().to_string());
    let picked = app_state.assignment_service.pick(tenant.0, &seed, None).await?;

    Ok((StatusCode::OK, Json(json!({ "seed": seed, "salesman": picked }))))
}
