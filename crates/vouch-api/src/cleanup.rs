use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use vouch_drafts::sweep::DRAFT_RETENTION_DAYS;

use crate::state::AppState;
use crate::store::with_db;

/// Background task that prunes stale drafts and expired scratch entries.
///
/// Drafts of every author not updated within the retention window are
/// deleted along with their hosted proofs.
pub async fn run_cleanup_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match cleanup_once(&state, Utc::now()).await {
            Ok((drafts, scratch)) => {
                if drafts + scratch > 0 {
                    info!("Cleanup: pruned {} stale drafts, {} expired scratch entries", drafts, scratch);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}

pub async fn cleanup_once(state: &AppState, now: DateTime<Utc>) -> anyhow::Result<(usize, usize)> {
    let cutoff = now - chrono::Duration::days(DRAFT_RETENTION_DAYS);
    let stale = with_db(&state.db, move |db| db.delete_stale_drafts(None, cutoff)).await?;

    for draft in &stale {
        if let Some(path) = &draft.proof_file_name {
            if let Err(e) = state.objects.remove(path).await {
                warn!("Stale draft {} proof {} not deleted: {}", draft.id, path, e);
            }
        }
    }

    let scratch = state.scratch.prune(now).await?;
    Ok((stale.len(), scratch))
}
