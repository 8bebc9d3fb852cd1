use std::collections::{HashMap, HashSet};

use axum::async_trait;
use chrono::Utc;
use diesel::dsl::{count_star, exists};
use diesel::prelude::*;
use eyre::Result;
use tracing::debug;
use uuid::Uuid;

use crate::pagination::Page;
use crate::schema::{user_follows, users};
use crate::service::ServiceState;
use crate::user_models::{FollowCounts, User, UserFollow};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FollowDirection {
    /// Users the subject follows.
    Following,
    /// Users following the subject.
    FollowedBy,
}

#[async_trait]
pub trait FollowRepository {
    /// Adds the edge `follower -> followed`. Returns false if it already existed.
    async fn follow(&self, follower: Uuid, followed: Uuid) -> Result<bool>;
    /// Removes the edge. Returns false if there was none.
    async fn unfollow(&self, follower: Uuid, followed: Uuid) -> Result<bool>;
    async fn is_following(&self, follower: Uuid, followed: Uuid) -> Result<bool>;
    async fn profile_links(&self, user: Uuid, direction: FollowDirection, page: Page) -> Result<(Vec<User>, i64)>;
    async fn follow_counts(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, FollowCounts>>;
    /// The subset of `ids` that `viewer` follows.
    async fn following_among(&self, viewer: Uuid, ids: &[Uuid]) -> Result<HashSet<Uuid>>;
    /// The subset of `ids` that follow `viewer`.
    async fn followers_among(&self, viewer: Uuid, ids: &[Uuid]) -> Result<HashSet<Uuid>>;

    async fn is_mutual(&self, a: Uuid, b: Uuid) -> Result<bool> {
        Ok(self.is_following(a, b).await? && self.is_following(b, a).await?)
    }

    /// The subset of `ids` in a mutual follow with `viewer`.
    async fn mutual_among(&self, viewer: Uuid, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let following = self.following_among(viewer, ids).await?;
        let followers = self.followers_among(viewer, ids).await?;
        Ok(following.intersection(&followers).copied().collect())
    }

    async fn counts_for(&self, id: Uuid) -> Result<FollowCounts> {
        Ok(self.follow_counts(&[id]).await?.remove(&id).unwrap_or_default())
    }
}

#[async_trait]
impl FollowRepository for ServiceState {
    async fn follow(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        let mut db = self.db_pool.get()?;
        let inserted = diesel::insert_into(user_follows::table)
            .values(UserFollow {
                follower_id: follower,
                followed_id: followed,
                created_at: Utc::now(),
            })
            .on_conflict_do_nothing()
            .execute(&mut db)?;
        debug!("follow {follower} -> {followed}: {inserted} new edge(s)");
        Ok(inserted > 0)
    }

    async fn unfollow(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        let mut db = self.db_pool.get()?;
        let deleted = diesel::delete(
            user_follows::table.filter(
                user_follows::follower_id
                    .eq(follower)
                    .and(user_follows::followed_id.eq(followed)),
            ),
        )
        .execute(&mut db)?;
        Ok(deleted > 0)
    }

    async fn is_following(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        let mut db = self.db_pool.get()?;
        let found = diesel::select(exists(
            user_follows::table
                .filter(user_follows::follower_id.eq(follower))
                .filter(user_follows::followed_id.eq(followed)),
        ))
        .get_result(&mut db)?;
        Ok(found)
    }

    async fn profile_links(&self, user: Uuid, direction: FollowDirection, page: Page) -> Result<(Vec<User>, i64)> {
        let mut db = self.db_pool.get()?;
        let linked = match direction {
            FollowDirection::FollowedBy => user_follows::table
                .inner_join(users::table.on(users::id.eq(user_follows::follower_id)))
                .filter(user_follows::followed_id.eq(user))
                .order(user_follows::created_at.desc())
                .offset(page.offset)
                .limit(page.limit)
                .select(User::as_select())
                .load(&mut db)?,
            FollowDirection::Following => user_follows::table
                .inner_join(users::table.on(users::id.eq(user_follows::followed_id)))
                .filter(user_follows::follower_id.eq(user))
                .order(user_follows::created_at.desc())
                .offset(page.offset)
                .limit(page.limit)
                .select(User::as_select())
                .load(&mut db)?,
        };
        let total = match direction {
            FollowDirection::FollowedBy => user_follows::table
                .filter(user_follows::followed_id.eq(user))
                .count()
                .get_result::<i64>(&mut db)?,
            FollowDirection::Following => user_follows::table
                .filter(user_follows::follower_id.eq(user))
                .count()
                .get_result::<i64>(&mut db)?,
        };
        Ok((linked, total))
    }

    async fn follow_counts(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, FollowCounts>> {
        let mut counts: HashMap<Uuid, FollowCounts> =
            ids.iter().map(|id| (*id, FollowCounts::default())).collect();
        if ids.is_empty() {
            return Ok(counts);
        }
        let mut db = self.db_pool.get()?;

        let followers: Vec<(Uuid, i64)> = user_follows::table
            .filter(user_follows::followed_id.eq_any(ids))
            .group_by(user_follows::followed_id)
            .select((user_follows::followed_id, count_star()))
            .load(&mut db)?;
        let following: Vec<(Uuid, i64)> = user_follows::table
            .filter(user_follows::follower_id.eq_any(ids))
            .group_by(user_follows::follower_id)
            .select((user_follows::follower_id, count_star()))
            .load(&mut db)?;

        for (id, n) in followers {
            counts.entry(id).or_default().followers = n;
        }
        for (id, n) in following {
            counts.entry(id).or_default().following = n;
        }
        Ok(counts)
    }

    async fn following_among(&self, viewer: Uuid, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let mut db = self.db_pool.get()?;
        let found: Vec<Uuid> = user_follows::table
            .select(user_follows::followed_id)
            .filter(user_follows::follower_id.eq(viewer))
            .filter(user_follows::followed_id.eq_any(ids))
            .load(&mut db)?;
        Ok(found.into_iter().collect())
    }

    async fn followers_among(&self, viewer: Uuid, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let mut db = self.db_pool.get()?;
        let found: Vec<Uuid> = user_follows::table
            .select(user_follows::follower_id)
            .filter(user_follows::followed_id.eq(viewer))
            .filter(user_follows::follower_id.eq_any(ids))
            .load(&mut db)?;
        Ok(found.into_iter().collect())
    }
}
