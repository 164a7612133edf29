// src/services/assignment_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LeadRepository, SalesmanRepository},
    models::salesman::{AssignmentConfig, AssignmentStrategy, Salesman, SalesmanLoad},
};

// Tentativas de atribuição quando o vendedor escolhido lota no meio do caminho.
const MAX_ASSIGN_ATTEMPTS: usize = 3;

// Pesos da mistura ponderada
const SCORE_WEIGHT: f64 = 0.65;
const LOAD_WEIGHT: f64 = 0.30;
const HEADROOM_WEIGHT: f64 = 0.05;
const NEUTRAL_SCORE_WEIGHT: f64 = 0.35;
const NEUTRAL: f64 = 0.5;

// =============================================================================
//  FUNÇÕES PURAS (sem banco)
// =============================================================================

/// FNV-1a 32 bits. Estável entre processos e versões.
pub fn stable_hash(input: &str) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for byte in input.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

fn seeded_hash(seed: &str, salesman_id: Uuid) -> u32 {
    stable_hash(&format!("{seed}:{salesman_id}"))
}

/// Ruído determinístico em [0, 0.001).
pub fn jitter(seed: &str, salesman_id: Uuid) -> f64 {
    f64::from(seeded_hash(seed, salesman_id) % 1000) / 1_000_000.0
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Peso da estratégia WEIGHTED, sem o jitter.
pub fn weighted_score(candidate: &SalesmanLoad, consider_score: bool) -> f64 {
    let load = candidate.active_load as f64;

    let score_term = if consider_score {
        SCORE_WEIGHT * clamp01(f64::from(candidate.score) / 100.0)
    } else {
        NEUTRAL_SCORE_WEIGHT * NEUTRAL
    };

    let headroom = if candidate.capacity > 0 {
        clamp01(1.0 - load / f64::from(candidate.capacity))
    } else {
        NEUTRAL
    };

    score_term + LOAD_WEIGHT * (1.0 / (1.0 + load)) + HEADROOM_WEIGHT * headroom
}

/// Escolhe o melhor vendedor elegível entre os candidatos já carregados.
/// `exclude` tira um vendedor da disputa (ex.: o responsável atual numa
/// reatribuição). Nunca devolve quem já atingiu a capacidade.
pub fn pick_best<'a>(
    candidates: &'a [SalesmanLoad],
    seed: &str,
    config: &AssignmentConfig,
    exclude: Option<Uuid>,
) -> Option<&'a SalesmanLoad> {
    let eligible = candidates
        .iter()
        .filter(|c| c.is_active && c.has_headroom() && Some(c.id) != exclude);

    match config.strategy {
        AssignmentStrategy::Weighted => {
            let mut best: Option<(&SalesmanLoad, f64)> = None;
            for candidate in eligible {
                let weight = weighted_score(candidate, config.consider_score) + jitter(seed, candidate.id);
                match best {
                    Some((_, top)) if top >= weight => {}
                    _ => best = Some((candidate, weight)),
                }
            }
            best.map(|(c, _)| c)
        }
        AssignmentStrategy::LeastActive => {
            let mut best: Option<(&SalesmanLoad, u32)> = None;
            for candidate in eligible {
                let hash = seeded_hash(seed, candidate.id);
                let better = match best {
                    None => true,
                    Some((top, top_hash)) => {
                        candidate.active_load < top.active_load
                            || (candidate.active_load == top.active_load && hash > top_hash)
                    }
                };
                if better {
                    best = Some((candidate, hash));
                }
            }
            best.map(|(c, _)| c)
        }
    }
}

// =============================================================================
//  SERVIÇO
// =============================================================================

#[derive(Debug, Clone)]
pub enum AssignOutcome {
    Assigned(Salesman),
    /// Outro processo mudou o responsável do lead antes de nós.
    LeadTaken,
    NoEligibleSalesman,
}

#[derive(Debug)]
enum Attempt {
    Assigned(Salesman),
    LeadTaken,
    SalesmanFull,
}

#[derive(Clone)]
pub struct AssignmentService {
    pool: PgPool,
    salesmen: SalesmanRepository,
    leads: LeadRepository,
    scan_limit: i64,
}

impl AssignmentService {
    pub fn new(pool: PgPool, salesmen: SalesmanRepository, leads: LeadRepository, scan_limit: i64) -> Self {
        Self {
            pool,
            salesmen,
            leads,
            scan_limit,
        }
    }

    pub async fn config_for(&self, tenant_id: Uuid) -> Result<AssignmentConfig, AppError> {
        let config = self
            .salesmen
            .find_assignment_config(&self.pool, tenant_id)
            .await?
            .unwrap_or_else(|| AssignmentConfig::default_for(tenant_id));
        Ok(config)
    }

    /// Só leitura: não grava nada. `None` quando ninguém é elegível.
    pub async fn pick(
        &self,
        tenant_id: Uuid,
        seed: &str,
        exclude: Option<Uuid>,
    ) -> Result<Option<Salesman>, AppError> {
        let config = self.config_for(tenant_id).await?;
        let candidates = self
            .salesmen
            .list_active_with_load(&self.pool, tenant_id, self.scan_limit)
            .await?;

        Ok(pick_best(&candidates, seed, &config, exclude)
            .cloned()
            .map(SalesmanLoad::into_salesman))
    }

    /// Escolhe e grava o responsável do lead. `expected` é o responsável que
    /// o chamador viu; se mudou nesse meio tempo, nada é gravado.
    pub async fn auto_assign(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        expected: Option<Uuid>,
        exclude: Option<Uuid>,
    ) -> Result<AssignOutcome, AppError> {
        let seed = lead_id.to_string();

        for attempt in 1..=MAX_ASSIGN_ATTEMPTS {
            let Some(choice) = self.pick(tenant_id, &seed, exclude).await? else {
                return Ok(AssignOutcome::NoEligibleSalesman);
            };

            match self.try_assign(tenant_id, lead_id, expected, choice.id).await? {
                Attempt::Assigned(salesman) => return Ok(AssignOutcome::Assigned(salesman)),
                Attempt::LeadTaken => return Ok(AssignOutcome::LeadTaken),
                Attempt::SalesmanFull => {
                    tracing::debug!(
                        tenant_id = %tenant_id,
                        lead_id = %lead_id,
                        salesman_id = %choice.id,
                        attempt,
                        "Vendedor lotou durante a atribuição, escolhendo de novo"
                    );
                }
            }
        }

        Ok(AssignOutcome::NoEligibleSalesman)
    }

    async fn try_assign(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        expected: Option<Uuid>,
        salesman_id: Uuid,
    ) -> Result<Attempt, AppError> {
        let mut tx = self.pool.begin().await?;

        // A trava serializa quem disputa o mesmo vendedor. A contagem vem numa
        // segunda query: em READ COMMITTED ela enxerga o que quem segurava a
        // trava já commitou.
        let salesman = match self.salesmen.lock_for_assignment(&mut *tx, tenant_id, salesman_id).await? {
            Some(s) if s.is_active => s,
            _ => return Ok(Attempt::SalesmanFull),
        };
        let active_load = self.salesmen.count_active_load(&mut *tx, tenant_id, salesman_id).await?;
        if !salesman.has_headroom(active_load) {
            return Ok(Attempt::SalesmanFull);
        }

        let swapped = self
            .leads
            .swap_assignee(&mut *tx, tenant_id, lead_id, expected, Some(salesman_id))
            .await?;
        if !swapped {
            return Ok(Attempt::LeadTaken);
        }

        tx.commit().await?;
        Ok(Attempt::Assigned(salesman))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn salesman(score: i32, capacity: i32, load: i64) -> SalesmanLoad {
        SalesmanLoad {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            is_active: true,
            score,
            capacity,
            created_at: Utc::now(),
            active_load: load,
        }
    }

    fn weighted() -> AssignmentConfig {
        AssignmentConfig::default_for(Uuid::nil())
    }

    #[test]
    fn fnv1a_matches_reference_vectors() {
        assert_eq!(stable_hash(""), 0x811c_9dc5);
        assert_eq!(stable_hash("a"), 0xe40c_292c);
        assert_eq!(stable_hash("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn jitter_stays_below_a_thousandth() {
        for _ in 0..200 {
            let j = jitter("lead-1", Uuid::new_v4());
            assert!((0.0..0.001).contains(&j));
        }
    }

    #[test]
    fn higher_score_wins_then_capacity_moves_to_next() {
        let mut a = salesman(80, 5, 0);
        let mut b = salesman(20, 5, 0);
        let config = weighted();

        let both = vec![a.clone(), b.clone()];
        assert_eq!(pick_best(&both, "lead-1", &config, None).map(|s| s.id), Some(a.id));

        a.active_load = 5;
        let a_full = vec![a.clone(), b.clone()];
        assert_eq!(pick_best(&a_full, "lead-6", &config, None).map(|s| s.id), Some(b.id));

        b.active_load = 5;
        let all_full = vec![a, b];
        assert!(pick_best(&all_full, "lead-7", &config, None).is_none());
    }

    #[test]
    fn same_seed_same_choice() {
        let pool: Vec<_> = (0..6).map(|_| salesman(50, 0, 1)).collect();
        let config = weighted();
        let first = pick_best(&pool, "lead-42", &config, None).map(|s| s.id);
        for _ in 0..10 {
            assert_eq!(pick_best(&pool, "lead-42", &config, None).map(|s| s.id), first);
        }
    }

    #[test]
    fn equal_candidates_spread_across_seeds() {
        let pool: Vec<_> = (0..4).map(|_| salesman(50, 0, 0)).collect();
        let config = weighted();
        let chosen: std::collections::HashSet<_> = (0..200)
            .filter_map(|i| pick_best(&pool, &format!("lead-{i}"), &config, None).map(|s| s.id))
            .collect();
        assert!(chosen.len() > 1);
    }

    #[test]
    fn single_eligible_is_always_chosen() {
        let only = salesman(0, 3, 2);
        let full = salesman(100, 1, 1);
        let pool = vec![full, only.clone()];
        for seed in ["a", "b", "c", "lead-9"] {
            assert_eq!(pick_best(&pool, seed, &weighted(), None).map(|s| s.id), Some(only.id));
        }
    }

    #[test]
    fn empty_and_inactive_pools_pick_nobody() {
        assert!(pick_best(&[], "x", &weighted(), None).is_none());

        let mut inactive = salesman(90, 0, 0);
        inactive.is_active = false;
        assert!(pick_best(&[inactive], "x", &weighted(), None).is_none());
    }

    #[test]
    fn uncapped_salesman_is_never_full() {
        let busy = salesman(50, 0, 10_000);
        assert!(busy.has_headroom());
        assert!(pick_best(std::slice::from_ref(&busy), "x", &weighted(), None).is_some());
    }

    #[test]
    fn excluded_salesman_is_skipped() {
        let a = salesman(100, 0, 0);
        let b = salesman(10, 0, 0);
        let pool = vec![a.clone(), b.clone()];
        assert_eq!(pick_best(&pool, "x", &weighted(), Some(a.id)).map(|s| s.id), Some(b.id));
        assert!(pick_best(&pool[..1], "x", &weighted(), Some(a.id)).is_none());
    }

    #[test]
    fn ignoring_score_favours_lower_load() {
        let star = salesman(100, 0, 4);
        let idle = salesman(0, 0, 0);
        let mut config = weighted();
        config.consider_score = false;
        let pool = vec![star, idle.clone()];
        assert_eq!(pick_best(&pool, "x", &config, None).map(|s| s.id), Some(idle.id));
    }

    #[test]
    fn least_active_picks_fewest_leads() {
        let mut config = weighted();
        config.strategy = AssignmentStrategy::LeastActive;

        let busy = salesman(100, 0, 3);
        let calm = salesman(0, 0, 1);
        let pool = vec![busy, calm.clone()];
        assert_eq!(pick_best(&pool, "x", &config, None).map(|s| s.id), Some(calm.id));
    }

    #[test]
    fn least_active_tie_goes_to_larger_hash() {
        let mut config = weighted();
        config.strategy = AssignmentStrategy::LeastActive;

        let a = salesman(0, 0, 2);
        let b = salesman(0, 0, 2);
        let expected = if seeded_hash("lead-1", a.id) >= seeded_hash("lead-1", b.id) { a.id } else { b.id };
        let pool = vec![a, b];
        assert_eq!(pick_best(&pool, "lead-1", &config, None).map(|s| s.id), Some(expected));
    }

    #[test]
    fn weighted_blend_components() {
        let s = salesman(100, 4, 0);
        assert!((weighted_score(&s, true) - (0.65 + 0.30 + 0.05)).abs() < 1e-9);

        let uncapped = salesman(0, 0, 1);
        assert!((weighted_score(&uncapped, true) - (0.30 * 0.5 + 0.05 * 0.5)).abs() < 1e-9);

        let neutral = salesman(100, 0, 0);
        assert!((weighted_score(&neutral, false) - (0.35 * 0.5 + 0.30 + 0.05 * 0.5)).abs() < 1e-9);
    }
}

#[cfg(test)]
mod storage_tests {
    use std::time::Duration;

    use sqlx::PgPool;

    use super::*;
    use crate::common::clock::FixedClock;
    use crate::common::test_fixtures::{self as fx, at};
    use crate::models::lead::LeadHeat;

    #[sqlx::test]
    async fn swap_assignee_only_writes_over_the_expected_owner(pool: PgPool) {
        let tenant = fx::tenant(&pool).await;
        let a = fx::salesman(&pool, tenant, 50, 0).await;
        let b = fx::salesman(&pool, tenant, 50, 0).await;
        let lead = fx::lead(&pool, tenant, LeadHeat::Warm, None).await;
        let leads = LeadRepository::new(pool.clone());

        assert!(leads.swap_assignee(&pool, tenant, lead.id, None, Some(a)).await.unwrap());
        // Quem ainda acha que o lead está livre perde.
        assert!(!leads.swap_assignee(&pool, tenant, lead.id, None, Some(b)).await.unwrap());

        let current = leads.find_by_id(&pool, tenant, lead.id).await.unwrap().unwrap();
        assert_eq!(current.assigned_to_salesman_id, Some(a));
    }

    #[sqlx::test]
    async fn waiting_racer_sees_committed_load_and_respects_capacity(pool: PgPool) {
        let tenant = fx::tenant(&pool).await;
        let salesman_id = fx::salesman(&pool, tenant, 80, 1).await;
        let first = fx::lead(&pool, tenant, LeadHeat::Hot, None).await;
        let second = fx::lead(&pool, tenant, LeadHeat::Hot, None).await;

        let app = fx::app(&pool, &FixedClock::at(at(9, 0)));
        let salesmen = SalesmanRepository::new(pool.clone());
        let leads = LeadRepository::new(pool.clone());

        // Primeiro concorrente segura a trava e grava.
        let mut tx = pool.begin().await.unwrap();
        let locked = salesmen.lock_for_assignment(&mut *tx, tenant, salesman_id).await.unwrap().unwrap();
        let load = salesmen.count_active_load(&mut *tx, tenant, salesman_id).await.unwrap();
        assert!(locked.has_headroom(load));
        assert!(leads.swap_assignee(&mut *tx, tenant, first.id, None, Some(salesman_id)).await.unwrap());

        // Segundo concorrente fica bloqueado na trava.
        let service = app.assignment_service.clone();
        let racer = tokio::spawn(async move { service.try_assign(tenant, second.id, None, salesman_id).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!racer.is_finished());

        tx.commit().await.unwrap();

        let attempt = racer.await.unwrap().unwrap();
        assert!(matches!(attempt, Attempt::SalesmanFull), "{attempt:?}");
        assert_eq!(fx::active_load(&pool, salesman_id).await, 1);
    }

    #[sqlx::test]
    async fn auto_assign_moves_on_when_favourite_is_full(pool: PgPool) {
        let tenant = fx::tenant(&pool).await;
        let star = fx::salesman(&pool, tenant, 100, 1).await;
        let backup = fx::salesman(&pool, tenant, 10, 0).await;
        fx::lead(&pool, tenant, LeadHeat::Warm, Some(star)).await;
        let lead = fx::lead(&pool, tenant, LeadHeat::Hot, None).await;

        let app = fx::app(&pool, &FixedClock::at(at(9, 0)));
        let outcome = app.assignment_service.auto_assign(tenant, lead.id, None, None).await.unwrap();

        match outcome {
            AssignOutcome::Assigned(s) => assert_eq!(s.id, backup),
            other => panic!("esperava atribuição, veio {other:?}"),
        }
        assert_eq!(fx::active_load(&pool, star).await, 1);
    }
}
