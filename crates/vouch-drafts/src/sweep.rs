use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::repository::{DraftRepository, ObjectStore, StoreError};

/// Durable drafts not updated for this long are removed.
pub const DRAFT_RETENTION_DAYS: i64 = 30;

/// Delete the author's durable drafts older than the retention window,
/// together with their hosted proofs. Returns the number removed.
pub async fn sweep_stale_drafts(
    drafts: &dyn DraftRepository,
    objects: &dyn ObjectStore,
    author_id: Uuid,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let cutoff = now - Duration::days(DRAFT_RETENTION_DAYS);
    let removed = drafts.delete_stale_drafts(author_id, cutoff).await?;

    for draft in &removed {
        if let Some(path) = &draft.proof_file_name {
            if let Err(e) = objects.delete(path).await {
                warn!("Stale draft {} proof {} not deleted: {}", draft.id, path, e);
            }
        }
    }

    if !removed.is_empty() {
        info!("Swept {} stale drafts for {}", removed.len(), author_id);
    }
    Ok(removed.len())
}
