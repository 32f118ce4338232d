use std::sync::Arc;

use crate::audit::AuditLogger;
use crate::config::AppConfig;
use crate::database::Database;
use crate::services::{build_mailer, Mailer, UploadStore};

/// Everything a handler needs, constructed once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub audit: AuditLogger,
    pub mailer: Arc<dyn Mailer>,
    pub uploads: UploadStore,
}

impl AppState {
    /// Production wiring: Postgres audit sink, configured mailer and upload root.
    pub fn new(db: Database, config: AppConfig) -> Self {
        let audit = AuditLogger::postgres(&db);
        let mailer = build_mailer(&config.mail);
        let uploads = UploadStore::new(config.uploads.root_dir.clone());
        Self {
            db,
            config: Arc::new(config),
            audit,
            mailer,
            uploads,
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_uploads(mut self, uploads: UploadStore) -> Self {
        self.uploads = uploads;
        self
    }
}
