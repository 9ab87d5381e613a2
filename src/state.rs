use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::uploads::UploadStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let uploads = Arc::new(UploadStore::from_config(&config));
        Self {
            db,
            config,
            uploads,
        }
    }
}
