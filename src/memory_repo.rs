//! In-memory implementations of the repositories, used by tests in place of postgres.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use axum::async_trait;
use chrono::{DateTime, Utc};
use eyre::{bail, eyre, Result};
use uuid::Uuid;

use crate::feed::{FeedType, Relation};
use crate::fitness_models::{Exercise, PersonalBest, PersonalBestCreate, Workout, WorkoutWithExercises};
use crate::follow_repo::{FollowDirection, FollowRepository};
use crate::notifier::{Notifier, PushNotification};
use crate::pagination::Page;
use crate::pbest_repo::{candidates_from_exercises, resolve_best, BestUpdate, PersonalBestRepository};
use crate::post_models::{WorkoutPost, WorkoutPostUpdate};
use crate::post_repo::PostRepository;
use crate::reminder_models::{CustomReminder, PushToken};
use crate::reminder_repo::{PushTokenRepository, ReminderRepository};
use crate::user_models::{FollowCounts, NewUser, User, UserFollow, UserUpdateMe};
use crate::user_repo::UserRepository;
use crate::workout_repo::WorkoutRepository;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    follows: Vec<UserFollow>,
    posts: Vec<WorkoutPost>,
    workouts: Vec<Workout>,
    exercises: Vec<Exercise>,
    bests: Vec<PersonalBest>,
    tokens: HashMap<Uuid, PushToken>,
    reminders: Vec<CustomReminder>,
}

impl Tables {
    fn follows(&self, follower: Uuid, followed: Uuid) -> bool {
        self.follows
            .iter()
            .any(|f| f.follower_id == follower && f.followed_id == followed)
    }

    fn relation(&self, viewer: Uuid, author: Uuid) -> Relation {
        Relation {
            viewer_follows_author: self.follows(viewer, author),
            author_follows_viewer: self.follows(author, viewer),
        }
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }
}

#[derive(Default)]
pub struct MemoryState {
    tables: Mutex<Tables>,
    failing_bests: AtomicBool,
}

impl MemoryState {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts a user directly, bypassing the signup route.
    pub fn add_user(&self, email: &str, full_name: Option<&str>) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            is_active: true,
            is_superuser: false,
            full_name: full_name.map(str::to_string),
            gender: None,
            date_of_birth: None,
            weight: None,
            height: None,
            created_at: Utc::now(),
        };
        self.tables().users.push(user.clone());
        user
    }

    pub fn set_flags(&self, id: Uuid, is_active: bool, is_superuser: bool) {
        if let Some(user) = self.tables().users.iter_mut().find(|u| u.id == id) {
            user.is_active = is_active;
            user.is_superuser = is_superuser;
        }
    }

    pub fn edge_count(&self) -> usize {
        self.tables().follows.len()
    }

    /// Makes every personal-best write fail, as a storage outage would.
    pub fn fail_personal_bests(&self) {
        self.failing_bests.store(true, Ordering::SeqCst);
    }

    fn check_best_writes(&self) -> Result<()> {
        if self.failing_bests.load(Ordering::SeqCst) {
            bail!("personal_bests unavailable");
        }
        Ok(())
    }
}

fn offer_best(tables: &mut Tables, user_id: Uuid, candidate: &PersonalBestCreate) -> PersonalBest {
    let existing = tables
        .bests
        .iter()
        .find(|b| b.user_id == user_id && b.metric == candidate.metric)
        .cloned();
    match resolve_best(existing, user_id, candidate) {
        BestUpdate::Insert(best) => {
            tables.bests.push(best.clone());
            best
        }
        BestUpdate::Replace(best) => {
            if let Some(stored) = tables.bests.iter_mut().find(|b| b.id == best.id) {
                *stored = best.clone();
            }
            best
        }
        BestUpdate::Keep(best) => best,
    }
}

fn newest_first(posts: &mut [WorkoutPost]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl UserRepository for MemoryState {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.email == new_user.email) {
            bail!("duplicate email {}", new_user.email);
        }
        let user = User {
            id: new_user.id,
            email: new_user.email,
            is_active: new_user.is_active,
            is_superuser: new_user.is_superuser,
            full_name: new_user.full_name,
            gender: new_user.gender,
            date_of_birth: new_user.date_of_birth,
            weight: new_user.weight,
            height: new_user.height,
            created_at: new_user.created_at,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables().user(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, changes: UserUpdateMe) -> Result<User> {
        let mut tables = self.tables();
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| eyre!("no user {id}"))?;
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(full_name) = changes.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(gender) = changes.gender {
            user.gender = Some(gender);
        }
        if let Some(dob) = changes.date_of_birth {
            user.date_of_birth = Some(dob);
        }
        if let Some(weight) = changes.weight {
            user.weight = Some(weight);
        }
        if let Some(height) = changes.height {
            user.height = Some(height);
        }
        Ok(user.clone())
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let tables = self.tables();
        Ok(tables.users.iter().filter(|u| ids.contains(&u.id)).cloned().collect())
    }

    async fn search_users(&self, query: &str, exclude: Uuid, page: Page) -> Result<(Vec<User>, i64)> {
        let needle = query.to_lowercase();
        let mut matches: Vec<User> = self
            .tables()
            .users
            .iter()
            .filter(|u| u.id != exclude)
            .filter(|u| {
                u.email.to_lowercase().contains(&needle)
                    || u.full_name.as_ref().is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            (a.full_name.is_none(), &a.full_name, &a.email).cmp(&(b.full_name.is_none(), &b.full_name, &b.email))
        });
        Ok((page.slice(&matches), matches.len() as i64))
    }
}

#[async_trait]
impl FollowRepository for MemoryState {
    async fn follow(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        let mut tables = self.tables();
        if tables.follows(follower, followed) {
            return Ok(false);
        }
        tables.follows.push(UserFollow {
            follower_id: follower,
            followed_id: followed,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn unfollow(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        let mut tables = self.tables();
        let before = tables.follows.len();
        tables
            .follows
            .retain(|f| !(f.follower_id == follower && f.followed_id == followed));
        Ok(tables.follows.len() < before)
    }

    async fn is_following(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        Ok(self.tables().follows(follower, followed))
    }

    async fn profile_links(&self, user: Uuid, direction: FollowDirection, page: Page) -> Result<(Vec<User>, i64)> {
        let tables = self.tables();
        let mut edges: Vec<&UserFollow> = tables
            .follows
            .iter()
            .filter(|f| match direction {
                FollowDirection::FollowedBy => f.followed_id == user,
                FollowDirection::Following => f.follower_id == user,
            })
            .collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let linked: Vec<User> = edges
            .iter()
            .filter_map(|f| match direction {
                FollowDirection::FollowedBy => tables.user(f.follower_id),
                FollowDirection::Following => tables.user(f.followed_id),
            })
            .cloned()
            .collect();
        Ok((page.slice(&linked), linked.len() as i64))
    }

    async fn follow_counts(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, FollowCounts>> {
        let tables = self.tables();
        Ok(ids
            .iter()
            .map(|id| {
                let counts = FollowCounts {
                    followers: tables.follows.iter().filter(|f| f.followed_id == *id).count() as i64,
                    following: tables.follows.iter().filter(|f| f.follower_id == *id).count() as i64,
                };
                (*id, counts)
            })
            .collect())
    }

    async fn following_among(&self, viewer: Uuid, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let tables = self.tables();
        Ok(ids.iter().copied().filter(|id| tables.follows(viewer, *id)).collect())
    }

    async fn followers_among(&self, viewer: Uuid, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let tables = self.tables();
        Ok(ids.iter().copied().filter(|id| tables.follows(*id, viewer)).collect())
    }
}

#[async_trait]
impl PostRepository for MemoryState {
    async fn create_post(&self, post: WorkoutPost) -> Result<WorkoutPost> {
        self.tables().posts.push(post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<WorkoutPost>> {
        Ok(self.tables().posts.iter().find(|p| p.id == id).cloned())
    }

    async fn user_posts(&self, author: Uuid, only_public: bool, page: Page) -> Result<(Vec<WorkoutPost>, i64)> {
        let mut posts: Vec<WorkoutPost> = self
            .tables()
            .posts
            .iter()
            .filter(|p| p.user_id == author && (p.is_public || !only_public))
            .cloned()
            .collect();
        newest_first(&mut posts);
        Ok((page.slice(&posts), posts.len() as i64))
    }

    async fn update_post(&self, id: Uuid, mut changes: WorkoutPostUpdate) -> Result<WorkoutPost> {
        changes.updated_at = Some(Utc::now());
        let mut tables = self.tables();
        let post = tables
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| eyre!("no post {id}"))?;
        changes.apply_to(post);
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables();
        let before = tables.posts.len();
        tables.posts.retain(|p| p.id != id);
        Ok(tables.posts.len() < before)
    }

    async fn feed_posts(&self, viewer: Uuid, feed: FeedType, page: Page) -> Result<(Vec<WorkoutPost>, i64)> {
        let tables = self.tables();
        let mut posts: Vec<WorkoutPost> = tables
            .posts
            .iter()
            .filter(|p| feed.admits(tables.relation(viewer, p.user_id), p.is_public))
            .cloned()
            .collect();
        newest_first(&mut posts);
        Ok((page.slice(&posts), posts.len() as i64))
    }
}

#[async_trait]
impl WorkoutRepository for MemoryState {
    async fn create_workout(&self, workout: Workout, exercises: Vec<Exercise>) -> Result<WorkoutWithExercises> {
        let candidates = candidates_from_exercises(&exercises, workout.date);
        if !candidates.is_empty() {
            self.check_best_writes()?;
        }
        let mut tables = self.tables();
        tables.workouts.push(workout.clone());
        tables.exercises.extend(exercises.iter().cloned());
        for candidate in &candidates {
            offer_best(&mut tables, workout.user_id, candidate);
        }
        Ok(WorkoutWithExercises { workout, exercises })
    }

    async fn user_workouts(&self, user_id: Uuid, page: Page) -> Result<(Vec<WorkoutWithExercises>, i64)> {
        let tables = self.tables();
        let mut workouts: Vec<Workout> = tables.workouts.iter().filter(|w| w.user_id == user_id).cloned().collect();
        workouts.sort_by(|a, b| (b.date, b.created_at).cmp(&(a.date, a.created_at)));
        let total = workouts.len() as i64;
        let listed = page
            .slice(&workouts)
            .into_iter()
            .map(|workout| {
                let exercises = tables.exercises.iter().filter(|e| e.workout_id == workout.id).cloned().collect();
                WorkoutWithExercises { workout, exercises }
            })
            .collect();
        Ok((listed, total))
    }
}

#[async_trait]
impl PersonalBestRepository for MemoryState {
    async fn upsert_personal_best(&self, user_id: Uuid, candidate: PersonalBestCreate) -> Result<PersonalBest> {
        self.check_best_writes()?;
        Ok(offer_best(&mut self.tables(), user_id, &candidate))
    }

    async fn personal_bests(&self, user_id: Uuid) -> Result<Vec<PersonalBest>> {
        let mut bests: Vec<PersonalBest> =
            self.tables().bests.iter().filter(|b| b.user_id == user_id).cloned().collect();
        bests.sort_by(|a, b| a.metric.cmp(&b.metric));
        Ok(bests)
    }

    async fn personal_best(&self, user_id: Uuid, metric: &str) -> Result<Option<PersonalBest>> {
        Ok(self
            .tables()
            .bests
            .iter()
            .find(|b| b.user_id == user_id && b.metric == metric)
            .cloned())
    }
}

#[async_trait]
impl PushTokenRepository for MemoryState {
    async fn upsert_push_token(&self, user_id: Uuid, expo_token: String) -> Result<PushToken> {
        let token = PushToken { user_id, expo_token, updated_at: Utc::now() };
        self.tables().tokens.insert(user_id, token.clone());
        Ok(token)
    }

    async fn push_token(&self, user_id: Uuid) -> Result<Option<PushToken>> {
        Ok(self.tables().tokens.get(&user_id).cloned())
    }
}

#[async_trait]
impl ReminderRepository for MemoryState {
    async fn schedule_reminder(&self, reminder: CustomReminder) -> Result<CustomReminder> {
        self.tables().reminders.push(reminder.clone());
        Ok(reminder)
    }

    async fn user_reminders(&self, user_id: Uuid) -> Result<Vec<CustomReminder>> {
        let mut reminders: Vec<CustomReminder> =
            self.tables().reminders.iter().filter(|r| r.user_id == user_id).cloned().collect();
        reminders.sort_by_key(|r| r.remind_time);
        Ok(reminders)
    }

    async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<CustomReminder>> {
        let mut due: Vec<CustomReminder> = self.tables().reminders.iter().filter(|r| r.is_due(now)).cloned().collect();
        due.sort_by_key(|r| r.remind_time);
        Ok(due)
    }

    async fn claim_reminder(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<CustomReminder>> {
        let mut tables = self.tables();
        Ok(tables
            .reminders
            .iter_mut()
            .find(|r| r.id == id && r.is_claimable(now))
            .map(|r| {
                r.claimed_at = Some(now);
                r.clone()
            }))
    }

    async fn mark_reminder_sent(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        if let Some(reminder) = self.tables().reminders.iter_mut().find(|r| r.id == id) {
            reminder.sent_at = Some(now);
        }
        Ok(())
    }

    async fn release_reminder(&self, id: Uuid) -> Result<()> {
        if let Some(reminder) = self.tables().reminders.iter_mut().find(|r| r.id == id && r.sent_at.is_none()) {
            reminder.claimed_at = None;
        }
        Ok(())
    }
}

/// Records pushes instead of sending them; can be switched to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<PushNotification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.set_failing(true);
        notifier
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<PushNotification> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn push(&self, notification: &PushNotification) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("push service unavailable");
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification.clone());
        Ok(())
    }
}

/// Sends one request through `app` and decodes the JSON body (`Null` when empty).
pub async fn call(
    app: &axum::Router,
    method: axum::http::Method,
    uri: &str,
    user: Option<Uuid>,
    body: Option<serde_json::Value>,
) -> (axum::http::StatusCode, serde_json::Value) {
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;
    use tower::ServiceExt;

    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user {
        builder = builder.header(crate::USER_ID_HEADER, id.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("valid request");
    let response = app.clone().oneshot(request).await.expect("infallible router");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}
