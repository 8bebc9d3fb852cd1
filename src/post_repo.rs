use axum::async_trait;
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use eyre::Result;
use tracing::debug;
use uuid::Uuid;

use crate::feed::FeedType;
use crate::pagination::Page;
use crate::post_models::{WorkoutPost, WorkoutPostUpdate};
use crate::schema::{user_follows, workout_posts};
use crate::service::ServiceState;

type PostPredicate = Box<dyn BoxableExpression<workout_posts::table, Pg, SqlType = Bool>>;

#[async_trait]
pub trait PostRepository {
    async fn create_post(&self, post: WorkoutPost) -> Result<WorkoutPost>;
    async fn get_post(&self, id: Uuid) -> Result<Option<WorkoutPost>>;
    /// Posts by `author`, newest first; only public ones when `only_public`.
    async fn user_posts(&self, author: Uuid, only_public: bool, page: Page) -> Result<(Vec<WorkoutPost>, i64)>;
    async fn update_post(&self, id: Uuid, changes: WorkoutPostUpdate) -> Result<WorkoutPost>;
    async fn delete_post(&self, id: Uuid) -> Result<bool>;
    async fn feed_posts(&self, viewer: Uuid, feed: FeedType, page: Page) -> Result<(Vec<WorkoutPost>, i64)>;
}

fn author_filter(author: Uuid, only_public: bool) -> PostPredicate {
    if only_public {
        Box::new(workout_posts::user_id.eq(author).and(workout_posts::is_public.eq(true)))
    } else {
        Box::new(workout_posts::user_id.eq(author))
    }
}

/// personal: the viewer follows the author and the post is public or the author
/// follows back. public: the post is public. combined: either.
fn feed_filter(viewer: Uuid, feed: FeedType) -> PostPredicate {
    let followees = user_follows::table
        .select(user_follows::followed_id)
        .filter(user_follows::follower_id.eq(viewer));
    let followers = user_follows::table
        .select(user_follows::follower_id)
        .filter(user_follows::followed_id.eq(viewer));
    let personal = workout_posts::user_id
        .eq_any(followees)
        .and(workout_posts::is_public.eq(true).or(workout_posts::user_id.eq_any(followers)));
    match feed {
        FeedType::Personal => Box::new(personal),
        FeedType::Public => Box::new(workout_posts::is_public.eq(true)),
        FeedType::Combined => Box::new(workout_posts::is_public.eq(true).or(personal)),
    }
}

#[async_trait]
impl PostRepository for ServiceState {
    async fn create_post(&self, post: WorkoutPost) -> Result<WorkoutPost> {
        let mut db = self.db_pool.get()?;
        let created = diesel::insert_into(workout_posts::table)
            .values(&post)
            .returning(WorkoutPost::as_returning())
            .get_result(&mut db)?;
        debug!("user {} created post {}", created.user_id, created.id);
        Ok(created)
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<WorkoutPost>> {
        let mut db = self.db_pool.get()?;
        let post = workout_posts::table
            .select(WorkoutPost::as_select())
            .filter(workout_posts::id.eq(id))
            .get_result(&mut db)
            .optional()?;
        Ok(post)
    }

    async fn user_posts(&self, author: Uuid, only_public: bool, page: Page) -> Result<(Vec<WorkoutPost>, i64)> {
        let mut db = self.db_pool.get()?;
        let total = workout_posts::table
            .filter(author_filter(author, only_public))
            .count()
            .get_result::<i64>(&mut db)?;
        let posts = workout_posts::table
            .filter(author_filter(author, only_public))
            .order((workout_posts::created_at.desc(), workout_posts::id.desc()))
            .offset(page.offset)
            .limit(page.limit)
            .select(WorkoutPost::as_select())
            .load(&mut db)?;
        Ok((posts, total))
    }

    async fn update_post(&self, id: Uuid, mut changes: WorkoutPostUpdate) -> Result<WorkoutPost> {
        let mut db = self.db_pool.get()?;
        changes.updated_at = Some(Utc::now());
        let updated = diesel::update(workout_posts::table.filter(workout_posts::id.eq(id)))
            .set(&changes)
            .returning(WorkoutPost::as_returning())
            .get_result(&mut db)?;
        Ok(updated)
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool> {
        let mut db = self.db_pool.get()?;
        let deleted = diesel::delete(workout_posts::table.filter(workout_posts::id.eq(id)))
            .execute(&mut db)?;
        Ok(deleted > 0)
    }

    async fn feed_posts(&self, viewer: Uuid, feed: FeedType, page: Page) -> Result<(Vec<WorkoutPost>, i64)> {
        let mut db = self.db_pool.get()?;
        let total = workout_posts::table
            .filter(feed_filter(viewer, feed))
            .count()
            .get_result::<i64>(&mut db)?;
        let posts = workout_posts::table
            .filter(feed_filter(viewer, feed))
            .order((workout_posts::created_at.desc(), workout_posts::id.desc()))
            .offset(page.offset)
            .limit(page.limit)
            .select(WorkoutPost::as_select())
            .load(&mut db)?;
        debug!("{feed} feed for {viewer}: {} of {total}", posts.len());
        Ok((posts, total))
    }
}
