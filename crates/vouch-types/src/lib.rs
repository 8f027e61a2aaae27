pub mod api;
pub mod models;
pub mod proof;

pub use models::{
    AccountType, AuthorProfile, Draft, DraftFields, DraftStatus, Listing, NewDraft, NewReview,
    Review,
};
pub use proof::{MediaKind, ProofError, ProofPayload};
