use axum::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use eyre::Result;
use tracing::debug;
use uuid::Uuid;

use crate::reminder_models::{lease_cutoff, CustomReminder, PushToken};
use crate::schema::{custom_reminders, push_tokens};
use crate::service::ServiceState;

#[async_trait]
pub trait PushTokenRepository {
    /// One token per user; the latest registration wins.
    async fn upsert_push_token(&self, user_id: Uuid, expo_token: String) -> Result<PushToken>;
    async fn push_token(&self, user_id: Uuid) -> Result<Option<PushToken>>;
}

#[async_trait]
pub trait ReminderRepository {
    async fn schedule_reminder(&self, reminder: CustomReminder) -> Result<CustomReminder>;
    async fn user_reminders(&self, user_id: Uuid) -> Result<Vec<CustomReminder>>;
    /// Pending, unclaimed reminders with `remind_time <= now`, oldest first.
    async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<CustomReminder>>;
    /// Takes the delivery claim on a pending reminder. `None` when it was sent,
    /// is held by a live claim, or is gone.
    async fn claim_reminder(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<CustomReminder>>;
    /// Records delivery; the reminder never becomes pending again.
    async fn mark_reminder_sent(&self, id: Uuid, now: DateTime<Utc>) -> Result<()>;
    /// Drops the claim so the next sweep retries without waiting out the lease.
    async fn release_reminder(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
impl PushTokenRepository for ServiceState {
    async fn upsert_push_token(&self, user_id: Uuid, expo_token: String) -> Result<PushToken> {
        let mut db = self.db_pool.get()?;
        let to_store = PushToken { user_id, expo_token, updated_at: Utc::now() };
        let stored = diesel::insert_into(push_tokens::table)
            .values(&to_store)
            .on_conflict(push_tokens::user_id)
            .do_update()
            .set((
                push_tokens::expo_token.eq(&to_store.expo_token),
                push_tokens::updated_at.eq(to_store.updated_at),
            ))
            .returning(PushToken::as_returning())
            .get_result(&mut db)?;
        debug!("stored push token for {user_id}");
        Ok(stored)
    }

    async fn push_token(&self, user_id: Uuid) -> Result<Option<PushToken>> {
        let mut db = self.db_pool.get()?;
        let token = push_tokens::table
            .select(PushToken::as_select())
            .filter(push_tokens::user_id.eq(user_id))
            .get_result(&mut db)
            .optional()?;
        Ok(token)
    }
}

#[async_trait]
impl ReminderRepository for ServiceState {
    async fn schedule_reminder(&self, reminder: CustomReminder) -> Result<CustomReminder> {
        let mut db = self.db_pool.get()?;
        let stored = diesel::insert_into(custom_reminders::table)
            .values(&reminder)
            .returning(CustomReminder::as_returning())
            .get_result(&mut db)?;
        Ok(stored)
    }

    async fn user_reminders(&self, user_id: Uuid) -> Result<Vec<CustomReminder>> {
        let mut db = self.db_pool.get()?;
        let reminders = custom_reminders::table
            .select(CustomReminder::as_select())
            .filter(custom_reminders::user_id.eq(user_id))
            .order(custom_reminders::remind_time.asc())
            .load(&mut db)?;
        Ok(reminders)
    }

    async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<CustomReminder>> {
        let mut db = self.db_pool.get()?;
        let due = custom_reminders::table
            .select(CustomReminder::as_select())
            .filter(custom_reminders::remind_time.le(now))
            .filter(custom_reminders::sent_at.is_null())
            .filter(
                custom_reminders::claimed_at
                    .is_null()
                    .or(custom_reminders::claimed_at.lt(lease_cutoff(now))),
            )
            .order(custom_reminders::remind_time.asc())
            .load(&mut db)?;
        Ok(due)
    }

    async fn claim_reminder(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<CustomReminder>> {
        let mut db = self.db_pool.get()?;
        let claimed = diesel::update(
            custom_reminders::table
                .filter(custom_reminders::id.eq(id))
                .filter(custom_reminders::sent_at.is_null())
                .filter(
                    custom_reminders::claimed_at
                        .is_null()
                        .or(custom_reminders::claimed_at.lt(lease_cutoff(now))),
                ),
        )
        .set(custom_reminders::claimed_at.eq(Some(now)))
        .returning(CustomReminder::as_returning())
        .get_result(&mut db)
        .optional()?;
        Ok(claimed)
    }

    async fn mark_reminder_sent(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut db = self.db_pool.get()?;
        diesel::update(custom_reminders::table.filter(custom_reminders::id.eq(id)))
            .set(custom_reminders::sent_at.eq(Some(now)))
            .execute(&mut db)?;
        Ok(())
    }

    async fn release_reminder(&self, id: Uuid) -> Result<()> {
        let mut db = self.db_pool.get()?;
        diesel::update(
            custom_reminders::table
                .filter(custom_reminders::id.eq(id))
                .filter(custom_reminders::sent_at.is_null()),
        )
        .set(custom_reminders::claimed_at.eq(None::<DateTime<Utc>>))
        .execute(&mut db)?;
        Ok(())
    }
}
