//! 共享应用状态

use nodule_database::{DatabasePool, DatabaseQueries};
use nodule_storage::UploadStore;

/// Web层运行参数
#[derive(Debug, Clone)]
pub struct WebSettings {
    pub max_upload_files: usize,
    pub max_upload_bytes: usize,
    pub seed_prefix: String,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            max_upload_files: 500,
            max_upload_bytes: 1024 * 1024 * 1024,
            seed_prefix: "STD-".to_string(),
        }
    }
}

/// 所有处理器共享的状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: DatabasePool,
    pub store: UploadStore,
    pub settings: WebSettings,
}

impl AppState {
    pub fn new(db: DatabasePool, store: UploadStore, settings: WebSettings) -> Self {
        Self { db, store, settings }
    }

    pub fn queries(&self) -> DatabaseQueries<'_> {
        DatabaseQueries::new(&self.db)
    }
}
