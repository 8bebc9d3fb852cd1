use axum::async_trait;
use diesel::prelude::*;
use eyre::Result;
use tracing::debug;
use uuid::Uuid;

use crate::pagination::Page;
use crate::schema::users;
use crate::service::ServiceState;
use crate::user_models::{NewUser, User, UserUpdateMe};

#[async_trait]
pub trait UserRepository {
    async fn create_user(&self, new_user: NewUser) -> Result<User>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn update_user(&self, id: Uuid, changes: UserUpdateMe) -> Result<User>;
    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>>;
    /// Case-insensitive substring match on full name or email, excluding `exclude`.
    async fn search_users(&self, query: &str, exclude: Uuid, page: Page) -> Result<(Vec<User>, i64)>;
}

impl UserUpdateMe {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.full_name.is_none()
            && self.gender.is_none()
            && self.date_of_birth.is_none()
            && self.weight.is_none()
            && self.height.is_none()
    }
}

/// `%query%` with LIKE wildcards in the query escaped.
pub fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl UserRepository for ServiceState {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut db = self.db_pool.get()?;
        let user = diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(&mut db)?;
        debug!("created user {}", user.id);
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let mut db = self.db_pool.get()?;
        let user = users::table
            .select(User::as_select())
            .filter(users::id.eq(id))
            .get_result(&mut db)
            .optional()?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut db = self.db_pool.get()?;
        let user = users::table
            .select(User::as_select())
            .filter(users::email.eq(email))
            .get_result(&mut db)
            .optional()?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: UserUpdateMe) -> Result<User> {
        let mut db = self.db_pool.get()?;
        if changes.is_empty() {
            return Ok(users::table
                .select(User::as_select())
                .filter(users::id.eq(id))
                .get_result(&mut db)?);
        }
        let user = diesel::update(users::table.filter(users::id.eq(id)))
            .set(&changes)
            .returning(User::as_returning())
            .get_result(&mut db)?;
        Ok(user)
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let mut db = self.db_pool.get()?;
        let found = users::table
            .select(User::as_select())
            .filter(users::id.eq_any(ids))
            .load(&mut db)?;
        Ok(found)
    }

    async fn search_users(&self, query: &str, exclude: Uuid, page: Page) -> Result<(Vec<User>, i64)> {
        let mut db = self.db_pool.get()?;
        let pattern = like_pattern(query);

        let total = users::table
            .filter(users::id.ne(exclude))
            .filter(users::email.ilike(pattern.clone()).or(users::full_name.ilike(pattern.clone())))
            .count()
            .get_result::<i64>(&mut db)?;

        let found = users::table
            .select(User::as_select())
            .filter(users::id.ne(exclude))
            .filter(users::email.ilike(pattern.clone()).or(users::full_name.ilike(pattern)))
            .order((users::full_name.asc(), users::email.asc()))
            .offset(page.offset)
            .limit(page.limit)
            .load(&mut db)?;

        Ok((found, total))
    }
}
