use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{self, ValidationError, LABEL_MAX, TEXT_MAX};

#[derive(Queryable, Selectable, Identifiable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name=crate::schema::workout_posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WorkoutPost {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub workout_type: String,
    pub duration_minutes: i32,
    pub calories_burned: Option<i32>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_public() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone)]
pub struct WorkoutPostCreate {
    pub title: String,
    pub description: Option<String>,
    pub workout_type: String,
    pub duration_minutes: i32,
    pub calories_burned: Option<i32>,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

#[derive(AsChangeset, Deserialize, Debug, Clone, Default)]
#[diesel(table_name=crate::schema::workout_posts)]
pub struct WorkoutPostUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub workout_type: Option<String>,
    pub duration_minutes: Option<i32>,
    pub calories_burned: Option<i32>,
    pub is_public: Option<bool>,
    #[serde(skip)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkoutPostCreate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::required("title", &self.title, TEXT_MAX)?;
        validation::required("workout_type", &self.workout_type, LABEL_MAX)?;
        validation::non_negative("duration_minutes", Some(self.duration_minutes))?;
        validation::non_negative("calories_burned", self.calories_burned)
    }

    pub fn into_post(self, user_id: Uuid) -> WorkoutPost {
        let now = Utc::now();
        WorkoutPost {
            id: Uuid::new_v4(),
            user_id,
            title: self.title.trim().to_string(),
            description: self.description,
            workout_type: self.workout_type.trim().to_string(),
            duration_minutes: self.duration_minutes,
            calories_burned: self.calories_burned,
            is_public: self.is_public,
            created_at: now,
            updated_at: now,
        }
    }
}

impl WorkoutPostUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validation::required("title", title, TEXT_MAX)?;
        }
        if let Some(workout_type) = &self.workout_type {
            validation::required("workout_type", workout_type, LABEL_MAX)?;
        }
        validation::non_negative("duration_minutes", self.duration_minutes)?;
        validation::non_negative("calories_burned", self.calories_burned)
    }

    /// Trims the text fields the same way a created post is trimmed.
    pub fn trimmed(mut self) -> Self {
        self.title = self.title.map(|t| t.trim().to_string());
        self.workout_type = self.workout_type.map(|t| t.trim().to_string());
        self
    }

    /// Applies the present fields to `post` the same way the changeset does.
    pub fn apply_to(&self, post: &mut WorkoutPost) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(description) = &self.description {
            post.description = Some(description.clone());
        }
        if let Some(workout_type) = &self.workout_type {
            post.workout_type = workout_type.clone();
        }
        if let Some(duration) = self.duration_minutes {
            post.duration_minutes = duration;
        }
        if let Some(calories) = self.calories_burned {
            post.calories_burned = Some(calories);
        }
        if let Some(is_public) = self.is_public {
            post.is_public = is_public;
        }
        if let Some(updated_at) = self.updated_at {
            post.updated_at = updated_at;
        }
    }
}

/// A post as returned to a particular viewer.
#[derive(Serialize, Debug, Clone)]
pub struct WorkoutPostPublic {
    #[serde(flatten)]
    pub post: WorkoutPost,
    pub user_full_name: Option<String>,
    pub is_mutual_follow: bool,
}
