use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name=crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub full_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name shown to other users: the full name when set, otherwise the email.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name=crate::schema::users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub full_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    pub fn from_register(register: UserRegister) -> Self {
        NewUser {
            id: Uuid::new_v4(),
            email: normalize_email(&register.email),
            is_active: true,
            is_superuser: false,
            full_name: register.full_name,
            gender: register.gender,
            date_of_birth: register.date_of_birth,
            weight: register.weight,
            height: register.height,
            created_at: Utc::now(),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserRegister {
    pub email: String,
    pub full_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
}

/// Profile edits from `PATCH /users/me`; absent fields are left untouched.
#[derive(AsChangeset, Deserialize, Debug, Clone, Default)]
#[diesel(table_name=crate::schema::users)]
pub struct UserUpdateMe {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name=crate::schema::user_follows)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserFollow {
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

#[derive(Serialize, Debug)]
pub struct UserPublicExtended {
    #[serde(flatten)]
    pub user: User,
    pub follower_count: i64,
    pub following_count: i64,
}

#[derive(Serialize, Debug)]
pub struct UserSearchResult {
    #[serde(flatten)]
    pub user: User,
    pub follower_count: i64,
    pub following_count: i64,
    pub is_following: bool,
}

/// A page of results plus the total number of matches.
#[derive(Serialize, Debug)]
pub struct Listing<T> {
    pub data: Vec<T>,
    pub count: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Message { message: message.into() }
    }
}
