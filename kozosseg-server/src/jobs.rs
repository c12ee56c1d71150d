use anyhow::Result;
use chrono::{NaiveDate, Utc};
use std::time::Duration;

use kozosseg_types::{Notification, NotificationType};

use crate::db::repositories::{FriendRepository, NotificationRepository};
use crate::state::AppState;

pub const BIRTHDAY_MESSAGE: &str = "ma ünnepli a születésnapját!";

/// Tell every accepted friend of today's birthday people about it.
///
/// One notification per (birthday person, friend) pair and day; pairs already
/// notified today are skipped. Returns how many notifications were created.
pub fn birthday_notifications(state: &AppState, today: NaiveDate) -> Result<usize> {
    let friends = FriendRepository::new(state.db.pool.clone());
    let notifications = NotificationRepository::new(state.db.pool.clone());

    let mut created = 0;
    for person in friends.get_birthdays_on(today)? {
        for friend_id in friends.get_friend_ids(person.id)? {
            if notifications.exists_on_day(friend_id, person.id, NotificationType::Birthday, today)? {
                continue;
            }
            let mut notification = Notification::new(
                friend_id,
                person.id,
                NotificationType::Birthday,
                format!("{} {}", person.full_name(), BIRTHDAY_MESSAGE),
            );
            // stamp on the day being processed so the per-day check sees it
            notification.created_at = today.and_time(Utc::now().time()).and_utc();
            let stored = notifications.insert(&notification)?;
            state.push_notification(&stored);
            created += 1;
        }
    }

    if created > 0 {
        tracing::info!("Created {} birthday notifications for {}", created, today);
    }
    Ok(created)
}

/// Run the birthday job now and then every `interval`
pub fn spawn_birthday_job(state: AppState, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            tracing::debug!("Running birthday notification job...");
            let today = Utc::now().date_naive();
            if let Err(e) = birthday_notifications(&state, today) {
                tracing::error!("Birthday notification job failed: {}", e);
            }
        }
    });
}

/// Remove expired sessions every `interval`
pub fn spawn_session_cleanup(state: AppState, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            tracing::debug!("Running periodic session cleanup...");
            match state.session_manager.cleanup_expired_sessions() {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!("Periodic cleanup: removed {} expired sessions", count);
                    }
                }
                Err(e) => {
                    tracing::error!("Periodic session cleanup failed: {}", e);
                }
            }
        }
    });
}
