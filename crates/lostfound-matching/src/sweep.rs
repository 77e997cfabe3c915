use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::MatchError;
use crate::evaluator::{Evaluator, SweepSummary};
use crate::store::{ItemStore, NotificationLedger};

/// Background task that re-evaluates the whole open pool on an interval.
///
/// Picks up pairs that were missed while the embedding provider was down and
/// reports that arrived through paths that never triggered an evaluation.
pub async fn run_rematch_loop<S>(evaluator: Arc<Evaluator<S>>, interval_secs: u64)
where
    S: ItemStore + NotificationLedger + 'static,
{
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    // The first tick completes immediately; submissions already evaluate on write.
    interval.tick().await;

    loop {
        interval.tick().await;

        match rematch_all(&evaluator).await {
            Ok(summary) => {
                if summary.candidates > 0 || summary.skipped > 0 {
                    info!(
                        "Rematch sweep: {} reports evaluated, {} skipped, {} candidates",
                        summary.evaluated, summary.skipped, summary.candidates
                    );
                }
            }
            Err(e) => {
                warn!("Rematch sweep error: {}", e);
            }
        }
    }
}

/// One sweep over every scope with open reports.
pub async fn rematch_all<S>(evaluator: &Evaluator<S>) -> Result<SweepSummary, MatchError>
where
    S: ItemStore + NotificationLedger + 'static,
{
    let store = evaluator.store().clone();
    let scopes = tokio::task::spawn_blocking(move || store.open_scopes()).await??;

    let mut total = SweepSummary::default();
    for scope in scopes {
        let summary = evaluator.evaluate_all(&scope).await?;
        total.evaluated += summary.evaluated;
        total.skipped += summary.skipped;
        total.candidates += summary.candidates;
    }
    Ok(total)
}
