//! Vouch review drafts: tiered persistence and promotion into the datastore.
//!
//! Provides:
//! - Browser-tier draft slots and large-object side storage ([`local`])
//! - Cookie-tier drafts with size-driven proof eviction ([`cookie`])
//! - The manifest of outstanding cookie drafts ([`manifest`])
//! - Durable-tier and object-store seams ([`repository`])
//! - Migration of browser/cookie drafts once a session appears ([`migrate`])
//! - Publish and discard transitions ([`publish`])
//! - Retention sweeps ([`sweep`])

pub mod cookie;
pub mod hosting;
pub mod local;
pub mod manifest;
pub mod migrate;
pub mod publish;
pub mod repository;
pub mod sweep;

pub use cookie::{CookieChannel, CookieDraftStore, CookieError, CookieRead};
pub use hosting::{HostedProof, ProofUploadError, host_inline_proof};
pub use local::{LocalDraftStore, LocalStorage, MemoryStorage, StorageError, StoredDraft};
pub use manifest::DraftManifest;
pub use migrate::{MigrationOutcome, MigrationReport, Migrator};
pub use publish::{PublishError, Publisher, ValidSubmission, validate};
pub use repository::{DraftRepository, ObjectStore, ReviewRepository, StoreError};
pub use sweep::sweep_stale_drafts;
