use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name=crate::schema::push_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PushToken {
    pub user_id: Uuid,
    pub expo_token: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct PushTokenRegister {
    pub expo_token: String,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name=crate::schema::custom_reminders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CustomReminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expo_token: String,
    pub remind_time: DateTime<Utc>,
    pub message: String,
    pub sent_at: Option<DateTime<Utc>>,
    /// Set while a sweep is delivering; a claim older than the lease is abandoned.
    #[serde(skip)]
    pub claimed_at: Option<DateTime<Utc>>,
}

/// How long a delivery claim holds before another sweep may take the reminder.
pub const CLAIM_LEASE_SECS: i64 = 300;

pub fn claim_lease() -> Duration {
    Duration::seconds(CLAIM_LEASE_SECS)
}

/// Claims taken before this instant have lapsed.
pub fn lease_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - claim_lease()
}

impl CustomReminder {
    pub fn new(user_id: Uuid, expo_token: String, remind_time: DateTime<Utc>, message: String) -> Self {
        CustomReminder {
            id: Uuid::new_v4(),
            user_id,
            expo_token,
            remind_time,
            message,
            sent_at: None,
            claimed_at: None,
        }
    }

    /// Pending, scheduled at or before `now`, and not held by a live claim.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.sent_at.is_none() && self.remind_time <= now && self.is_claimable(now)
    }

    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.sent_at.is_none() && self.claimed_at.map_or(true, |claimed| claimed < lease_cutoff(now))
    }
}

#[derive(Deserialize, Debug)]
pub struct ReminderCreate {
    pub remind_time: DateTime<Utc>,
    pub message: String,
    pub expo_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn due_only_when_pending_and_past() {
        let now = Utc::now();
        let mut reminder = CustomReminder::new(Uuid::new_v4(), "tok".into(), now, "stretch".into());
        assert!(reminder.is_due(now));
        assert!(!reminder.is_due(now - Duration::seconds(1)));
        reminder.sent_at = Some(now);
        assert!(!reminder.is_due(now + Duration::hours(1)));
    }

    #[test]
    fn claims_lapse_after_the_lease() {
        let now = Utc::now();
        let mut reminder = CustomReminder::new(Uuid::new_v4(), "tok".into(), now, "stretch".into());
        reminder.claimed_at = Some(now);
        assert!(!reminder.is_due(now));
        assert!(!reminder.is_due(now + claim_lease()));
        assert!(reminder.is_due(now + claim_lease() + Duration::seconds(1)));
    }
}
