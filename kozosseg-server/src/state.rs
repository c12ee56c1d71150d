use std::sync::Arc;
use std::time::Duration;

use kozosseg_types::{Notification, PushEvent};

use crate::config::Settings;
use crate::db::repositories::NotificationRepository;
use crate::db::Database;
use crate::mail::{LogMailSender, MailSender};
use crate::password::PasswordHasher;
use crate::realtime::Hub;
use crate::session::SessionManager;
use crate::storage::{FileStorage, LocalFileStorage};
use crate::verification::VerificationCodeCache;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub session_manager: SessionManager,
    pub hub: Hub,
    pub mailer: Arc<dyn MailSender>,
    pub storage: Arc<dyn FileStorage>,
    pub verification_codes: VerificationCodeCache,
    pub hasher: PasswordHasher,
    pub public_url: String,
}

impl AppState {
    pub fn new(
        db: Database,
        settings: &Settings,
        mailer: Arc<dyn MailSender>,
        storage: Arc<dyn FileStorage>,
    ) -> Self {
        let session_manager = SessionManager::new(db.clone());
        Self {
            db,
            session_manager,
            hub: Hub::new(),
            mailer,
            storage,
            verification_codes: VerificationCodeCache::new(Duration::from_secs(
                settings.jobs.verification_code_ttl_secs,
            )),
            hasher: PasswordHasher::default(),
            public_url: settings.server.public_url.clone(),
        }
    }

    /// State over an in-memory database with logging mail and storage under `storage_root`
    pub fn for_tests(db: Database, storage_root: &std::path::Path) -> Self {
        Self {
            session_manager: SessionManager::new(db.clone()),
            db,
            hub: Hub::new(),
            mailer: Arc::new(LogMailSender),
            storage: Arc::new(LocalFileStorage::new(storage_root)),
            verification_codes: VerificationCodeCache::new(Duration::from_secs(900)),
            hasher: PasswordHasher::with_cost(4),
            public_url: "http://localhost:3000".to_string(),
        }
    }

    /// Get authenticated user ID from session token
    pub fn get_authenticated_user_id_from_token(&self, token: &str) -> Option<i64> {
        match self.session_manager.validate_session(token) {
            Ok(user_id) => user_id,
            Err(e) => {
                tracing::error!("Session lookup failed: {}", e);
                None
            }
        }
    }

    /// Send a stored notification (with sender details) to the receiver's live connections
    pub fn push_notification(&self, notification: &Notification) {
        let repo = NotificationRepository::new(self.db.pool.clone());
        match repo.get_with_avatar(notification.id) {
            Ok(Some(full)) => {
                let delivered = self
                    .hub
                    .send_to_user(notification.receiver_id, &PushEvent::Notification(full));
                tracing::debug!(
                    "Notification {} pushed to {} connection(s)",
                    notification.id,
                    delivered
                );
            }
            Ok(None) => tracing::warn!("Notification {} vanished before push", notification.id),
            Err(e) => tracing::error!("Failed to load notification {} for push: {}", notification.id, e),
        }
    }
}
