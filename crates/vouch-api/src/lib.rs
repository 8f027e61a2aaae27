pub mod auth;
pub mod cleanup;
pub mod cookies;
pub mod drafts;
pub mod error;
pub mod listings;
pub mod middleware;
pub mod objects;
pub mod reviews;
pub mod scratch;
pub mod state;
pub mod store;
pub mod temp_storage;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

pub use state::{AppState, AppStateInner};

/// Request bodies carry base64 proofs; leave headroom over the object limit.
const MAX_BODY_SIZE: usize = 80 * 1024 * 1024;

/// All HTTP routes. Tracing and CORS layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/admin/users/{id}/verify", post(auth::verify_user))
        .route("/listings/{id}", get(listings::get_listing))
        .route("/listings/{id}/reviews", get(listings::list_reviews))
        // PUT and DELETE check the bearer token themselves; GET is public
        .route(
            "/objects/{*path}",
            get(objects::get_object)
                .put(objects::put_object)
                .delete(objects::delete_object),
        )
        .route(
            "/api/cookies",
            get(cookies::get_cookie)
                .post(cookies::set_cookie)
                .delete(cookies::delete_cookie),
        )
        .route(
            "/api/temp-storage",
            get(temp_storage::fetch).post(temp_storage::store),
        );

    let protected_routes = Router::new()
        .route("/auth/session", get(auth::session))
        .route("/listings", post(listings::create_listing))
        .route("/reviews", post(reviews::publish))
        .route("/drafts", get(drafts::list_drafts).put(drafts::save_draft))
        .route("/drafts/active", get(drafts::active_draft))
        .route("/drafts/stale", delete(drafts::sweep_stale))
        .route(
            "/drafts/{id}",
            get(drafts::get_draft).delete(drafts::discard_draft),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}
