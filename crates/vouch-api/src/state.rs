use std::sync::Arc;

use vouch_db::Database;
use vouch_drafts::Publisher;

use crate::objects::FsObjectStore;
use crate::scratch::ScratchStore;
use crate::store::SqliteStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub store: SqliteStore,
    pub objects: Arc<FsObjectStore>,
    pub scratch: Arc<dyn ScratchStore>,
    pub publisher: Publisher,
    pub jwt_secret: String,
    /// Verification endpoint is disabled when unset.
    pub admin_token: Option<String>,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        objects: Arc<FsObjectStore>,
        scratch: Arc<dyn ScratchStore>,
        jwt_secret: String,
        admin_token: Option<String>,
    ) -> AppState {
        let store = SqliteStore::new(db.clone());
        let shared = Arc::new(store.clone());
        let publisher = Publisher::new(shared.clone(), shared, objects.clone());

        Arc::new(Self {
            db,
            store,
            objects,
            scratch,
            publisher,
            jwt_secret,
            admin_token,
        })
    }
}
