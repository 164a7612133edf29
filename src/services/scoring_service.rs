// src/services/scoring_service.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{clock::Clock, error::AppError},
    db::{LeadRepository, SalesmanRepository, TriageRepository},
    models::{
        lead::LeadEventKind,
        salesman::{LeaderboardEntry, ScoreUpdate, SuccessEvent, SuccessEventType},
    },
};

const LEADERBOARD_SIZE: i64 = 10;

/// Score relativo: quem mais pontuou na janela fica com 100, os demais
/// proporcionalmente. Sem pontos no tenant, todos ficam com 0.
pub fn compute_scores(salesman_ids: &[Uuid], points: &HashMap<Uuid, f64>) -> Vec<ScoreUpdate> {
    let points_of = |id: &Uuid| points.get(id).copied().unwrap_or(0.0).max(0.0);
    let max_points = salesman_ids.iter().map(points_of).fold(0.0_f64, f64::max);

    salesman_ids
        .iter()
        .map(|id| {
            let score = if max_points > 0.0 {
                (100.0 * points_of(id) / max_points).round().clamp(0.0, 100.0) as i32
            } else {
                0
            };
            ScoreUpdate {
                salesman_id: *id,
                score,
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct ScoringService {
    pool: PgPool,
    salesmen: SalesmanRepository,
    leads: LeadRepository,
    triage: TriageRepository,
    clock: Arc<dyn Clock>,
    default_lookback_days: i64,
}

impl ScoringService {
    pub fn new(
        pool: PgPool,
        salesmen: SalesmanRepository,
        leads: LeadRepository,
        triage: TriageRepository,
        clock: Arc<dyn Clock>,
        default_lookback_days: i64,
    ) -> Self {
        Self {
            pool,
            salesmen,
            leads,
            triage,
            clock,
            default_lookback_days,
        }
    }

    pub fn default_lookback_days(&self) -> i64 {
        self.default_lookback_days
    }

    // =========================================================================
    //  RECÁLCULO
    // =========================================================================

    pub async fn recompute(&self, tenant_id: Uuid, lookback_days: i64) -> Result<Vec<ScoreUpdate>, AppError> {
        let now = self.clock.now();
        let since = now - Duration::days(lookback_days);

        let ids = self.salesmen.list_ids(&self.pool, tenant_id).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let points: HashMap<Uuid, f64> = self
            .salesmen
            .sum_points(&self.pool, tenant_id, since, now)
            .await?
            .into_iter()
            .map(|p| (p.salesman_id, p.points))
            .collect();

        let updates = compute_scores(&ids, &points);

        let mut tx = self.pool.begin().await?;
        for update in &updates {
            self.salesmen
                .update_score(&mut *tx, tenant_id, update.salesman_id, update.score)
                .await?;
        }
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            salesmen = updates.len(),
            lookback_days,
            "Scores recalculados"
        );

        Ok(updates)
    }

    pub async fn leaderboard(&self, tenant_id: Uuid, days: i64) -> Result<Vec<LeaderboardEntry>, AppError> {
        let since = self.clock.now() - Duration::days(days);
        self.salesmen
            .leaderboard(&self.pool, tenant_id, since, LEADERBOARD_SIZE)
            .await
    }

    // =========================================================================
    //  EVENTOS DE SUCESSO
    // =========================================================================

    /// Registra o sucesso para o responsável atual do lead, fecha a triagem
    /// aberta e recalcula os scores do tenant.
    pub async fn record_success(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        event_type: SuccessEventType,
        weight: f64,
        note: Option<&str>,
    ) -> Result<SuccessEvent, AppError> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let lead = self
            .leads
            .find_by_id(&mut *tx, tenant_id, lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;

        let event = self
            .salesmen
            .insert_success_event(
                &mut *tx,
                tenant_id,
                lead.id,
                lead.assigned_to_salesman_id,
                event_type,
                weight,
                note,
                now,
            )
            .await?;

        self.leads
            .append_event(
                &mut *tx,
                tenant_id,
                lead.id,
                LeadEventKind::SuccessRecorded,
                json!({
                    "successEventId": event.id,
                    "type": event.event_type,
                    "weight": event.weight,
                    "salesmanId": event.salesman_id,
                }),
            )
            .await?;

        let closed = self.triage.close_open_for_lead(&mut *tx, tenant_id, lead.id).await?;
        if closed > 0 {
            self.leads
                .append_event(
                    &mut *tx,
                    tenant_id,
                    lead.id,
                    LeadEventKind::TriageAutoClosed,
                    json!({ "reason": "SUCCESS_RECORDED", "closed": closed }),
                )
                .await?;
        }

        tx.commit().await?;

        // O evento já está gravado; um recálculo com falha fica para a próxima vez.
        if let Err(e) = self.recompute(tenant_id, self.default_lookback_days).await {
            tracing::warn!(tenant_id = %tenant_id, error = %e, "Falha ao recalcular scores após sucesso");
        }

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn score_of(updates: &[ScoreUpdate], id: Uuid) -> i32 {
        updates.iter().find(|u| u.salesman_id == id).map(|u| u.score).unwrap()
    }

    #[test]
    fn top_performer_scores_100_and_others_scale() {
        let s = ids(3);
        let points = HashMap::from([(s[0], 40.0), (s[1], 10.0)]);
        let updates = compute_scores(&s, &points);

        assert_eq!(score_of(&updates, s[0]), 100);
        assert_eq!(score_of(&updates, s[1]), 25);
        assert_eq!(score_of(&updates, s[2]), 0);
    }

    #[test]
    fn scores_round_and_stay_in_range() {
        let s = ids(3);
        let points = HashMap::from([(s[0], 3.0), (s[1], 2.0), (s[2], 1.0)]);
        let updates = compute_scores(&s, &points);

        assert_eq!(score_of(&updates, s[1]), 67);
        assert_eq!(score_of(&updates, s[2]), 33);
        assert!(updates.iter().all(|u| (0..=100).contains(&u.score)));
    }

    #[test]
    fn no_events_means_all_zero() {
        let s = ids(4);
        let updates = compute_scores(&s, &HashMap::new());
        assert_eq!(updates.len(), 4);
        assert!(updates.iter().all(|u| u.score == 0));
    }

    #[test]
    fn no_salesmen_means_no_updates() {
        assert!(compute_scores(&[], &HashMap::from([(Uuid::new_v4(), 5.0)])).is_empty());
    }

    #[test]
    fn recomputing_same_points_is_idempotent() {
        let s = ids(5);
        let points: HashMap<_, _> = s.iter().enumerate().map(|(i, id)| (*id, i as f64 * 7.5)).collect();
        assert_eq!(compute_scores(&s, &points), compute_scores(&s, &points));
    }

    #[test]
    fn points_of_unknown_salesmen_are_ignored() {
        let s = ids(2);
        let stranger = Uuid::new_v4();
        let points = HashMap::from([(s[0], 5.0), (stranger, 500.0)]);
        let updates = compute_scores(&s, &points);
        assert_eq!(score_of(&updates, s[0]), 100);
    }
}
