use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::{StreamExt, stream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use lostfound_types::models::{ItemKind, ItemReport, ItemStatus, MatchMethod};

use crate::config::MatchConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::MatchError;
use crate::features::{FeatureExtractor, FeatureVector};
use crate::scorer::Scorer;
use crate::store::{ItemStore, NotificationLedger, RecordOutcome, StatusUpdate};

/// One scored lost/found pair from a single evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub lost_id: Uuid,
    pub found_id: Uuid,
    pub score: f64,
    pub category_match: bool,
    pub color_match: bool,
    /// Which embeddings contributed to `score`.
    pub match_method: MatchMethod,
    pub lost_owner_user_id: Uuid,
    /// `created_at` of the report on the other side of the triggering one.
    pub opposing_created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub evaluated: usize,
    pub skipped: usize,
    pub candidates: usize,
}

/// Scores a report against the opposing pool and commits qualifying pairs to
/// the ledger. The pool holds every report of the other kind that is not
/// closed, so an item that already matched keeps receiving notifications.
pub struct Evaluator<S> {
    store: Arc<S>,
    extractor: FeatureExtractor,
    scorer: Scorer,
    config: MatchConfig,
}

impl<S> Evaluator<S>
where
    S: ItemStore + NotificationLedger + 'static,
{
    pub fn new(
        store: Arc<S>,
        provider: Arc<dyn EmbeddingProvider>,
        config: MatchConfig,
    ) -> Result<Self, MatchError> {
        config.validate()?;
        let extractor = FeatureExtractor::new(provider, &config)?;
        Ok(Self {
            store,
            extractor,
            scorer: Scorer::new(config.weights),
            config,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Evaluates a persisted report against open and matched reports of the
    /// opposing kind in `scope`. Returns committed candidates, best first.
    ///
    /// Re-running over an unchanged pool never creates a second notification
    /// for a pair: the ledger owns deduplication.
    pub async fn evaluate(&self, report: &ItemReport, scope: &str) -> Result<Vec<MatchCandidate>, MatchError> {
        let trigger = self.extractor.extract(report).await?;

        if report.status == ItemStatus::Closed {
            debug!("Report {} is closed, nothing to evaluate", report.id);
            return Ok(Vec::new());
        }

        let opposing = report.kind.opposing();
        let pool_scope = scope.to_string();
        let pool = self
            .blocking(move |store| store.get_eligible(opposing, &pool_scope))
            .await?;

        if pool.is_empty() {
            debug!("No eligible {} reports in scope '{}'", opposing, scope);
            return Ok(Vec::new());
        }

        let ranked = self.rank(report, &trigger, pool).await;
        if ranked.is_empty() {
            return Ok(ranked);
        }

        self.commit(report, ranked).await
    }

    /// Re-evaluates every open report in `scope` against its eligible pool.
    pub async fn evaluate_all(&self, scope: &str) -> Result<SweepSummary, MatchError> {
        let mut summary = SweepSummary::default();

        for kind in [ItemKind::Lost, ItemKind::Found] {
            let pool_scope = scope.to_string();
            let reports = self
                .blocking(move |store| store.get_open(kind, &pool_scope))
                .await?;

            for report in reports {
                match self.evaluate(&report, scope).await {
                    Ok(candidates) => {
                        summary.evaluated += 1;
                        summary.candidates += candidates.len();
                    }
                    Err(MatchError::InvalidReport { id, reason }) => {
                        warn!("Skipping report {} during sweep: {}", id, reason);
                        summary.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(summary)
    }

    /// Extracts and scores the pool, keeps what clears the threshold and
    /// returns at most `max_results` candidates in rank order.
    async fn rank(&self, report: &ItemReport, trigger: &FeatureVector, pool: Vec<ItemReport>) -> Vec<MatchCandidate> {
        let extractor = &self.extractor;
        let extracted: Vec<(ItemReport, Result<FeatureVector, MatchError>)> = stream::iter(pool)
            .filter(|other| std::future::ready(other.id != report.id))
            .map(|other| async move {
                let features = extractor.extract(&other).await;
                (other, features)
            })
            .buffer_unordered(self.config.extract_concurrency)
            .collect()
            .await;

        let mut candidates = Vec::new();
        for (other, features) in extracted {
            let features = match features {
                Ok(f) => f,
                Err(e) => {
                    warn!("Skipping report {} while evaluating {}: {}", other.id, report.id, e);
                    continue;
                }
            };

            let (lost, found) = match report.kind {
                ItemKind::Lost => (report, &other),
                ItemKind::Found => (&other, report),
            };

            if self.config.require_date_order && found.occurred_on < lost.occurred_on {
                continue;
            }

            let similarity = self.scorer.compare(trigger, &features);
            if similarity.score < self.config.threshold {
                continue;
            }

            candidates.push(MatchCandidate {
                lost_id: lost.id,
                found_id: found.id,
                score: similarity.score,
                category_match: similarity.category_match,
                color_match: similarity.color_match,
                match_method: similarity.method,
                lost_owner_user_id: lost.owner_user_id,
                opposing_created_at: other.created_at,
            });
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.opposing_created_at.cmp(&a.opposing_created_at))
        });
        candidates.truncate(self.config.max_results);
        candidates
    }

    /// Records each candidate and moves both reports to `matched`. Stops as
    /// soon as the triggering report is closed or gone.
    async fn commit(&self, report: &ItemReport, ranked: Vec<MatchCandidate>) -> Result<Vec<MatchCandidate>, MatchError> {
        let mut committed = Vec::with_capacity(ranked.len());

        for candidate in ranked {
            let trigger_id = report.id;
            let current = self.blocking(move |store| store.get(&trigger_id)).await?;
            match current {
                Some(current) if current.status != ItemStatus::Closed => {}
                Some(_) => {
                    info!("Report {} was closed mid-evaluation, abandoning pass", trigger_id);
                    break;
                }
                None => {
                    info!("Report {} disappeared mid-evaluation, abandoning pass", trigger_id);
                    break;
                }
            }

            let to_record = candidate.clone();
            match self.blocking(move |store| store.record(&to_record)).await? {
                RecordOutcome::Created(n) => info!(
                    "Match notification {} recorded: lost {} / found {} (score {:.3})",
                    n.id, n.lost_id, n.found_id, n.score
                ),
                RecordOutcome::Existing(n) => debug!(
                    "Pair lost {} / found {} already notified as {}",
                    n.lost_id, n.found_id, n.id
                ),
            }

            for id in [candidate.lost_id, candidate.found_id] {
                let outcome = self
                    .blocking(move |store| store.set_status(&id, ItemStatus::Open, ItemStatus::Matched))
                    .await?;
                if outcome == StatusUpdate::Conflict {
                    debug!("Report {} was not open, status left unchanged", id);
                }
            }

            committed.push(candidate);
        }

        Ok(committed)
    }

    /// Runs a store call on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T, MatchError>
    where
        F: FnOnce(&S) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || f(&store)).await?;
        Ok(result?)
    }
}
