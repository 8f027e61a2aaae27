//! Client side of the review draft lifecycle.
//!
//! [`ApiClient`] talks to the server and doubles as the cookie channel,
//! durable draft repository and object store that `vouch-drafts` works
//! against. [`DraftSession`] is what a review form drives.

pub mod api;
pub mod error;
pub mod session;
pub mod storage;

pub use api::{ApiClient, Session};
pub use error::ClientError;
pub use session::{DraftSession, LoadReport, SavedDraft};
pub use storage::DirStorage;
