use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{self, ValidationError, LABEL_MAX, TEXT_MAX};

#[derive(Queryable, Selectable, Identifiable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name=crate::schema::workouts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Workout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    pub duration_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Associations, Serialize, Debug, Clone, PartialEq)]
#[diesel(belongs_to(Workout))]
#[diesel(table_name=crate::schema::exercises)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Exercise {
    pub id: Uuid,
    pub workout_id: Uuid,
    pub name: String,
    pub sets: Option<i32>,
    pub reps: Option<i32>,
    pub weight: Option<f64>,
}

#[derive(Serialize, Debug, Clone)]
pub struct WorkoutWithExercises {
    #[serde(flatten)]
    pub workout: Workout,
    pub exercises: Vec<Exercise>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExerciseCreate {
    pub name: String,
    pub sets: Option<i32>,
    pub reps: Option<i32>,
    pub weight: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WorkoutCreate {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub exercises: Vec<ExerciseCreate>,
}

impl WorkoutCreate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::required("name", &self.name, TEXT_MAX)?;
        validation::non_negative("duration_minutes", self.duration_minutes)?;
        for exercise in &self.exercises {
            validation::required("exercise name", &exercise.name, TEXT_MAX)?;
            validation::non_negative("sets", exercise.sets)?;
            validation::non_negative("reps", exercise.reps)?;
        }
        Ok(())
    }

    pub fn into_rows(self, user_id: Uuid) -> (Workout, Vec<Exercise>) {
        let workout = Workout {
            id: Uuid::new_v4(),
            user_id,
            name: self.name.trim().to_string(),
            date: self.date.unwrap_or_else(|| Utc::now().date_naive()),
            duration_minutes: self.duration_minutes,
            created_at: Utc::now(),
        };
        let exercises = self
            .exercises
            .into_iter()
            .map(|e| Exercise {
                id: Uuid::new_v4(),
                workout_id: workout.id,
                name: e.name.trim().to_string(),
                sets: e.sets,
                reps: e.reps,
                weight: e.weight,
            })
            .collect();
        (workout, exercises)
    }
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name=crate::schema::personal_bests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PersonalBest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub metric: String,
    pub value: f64,
    pub date: NaiveDate,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PersonalBestCreate {
    pub metric: String,
    pub value: f64,
    pub date: Option<NaiveDate>,
}

impl PersonalBestCreate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::required("metric", &self.metric, LABEL_MAX)?;
        if !self.value.is_finite() {
            return Err(ValidationError::NotFinite { field: "value" });
        }
        Ok(())
    }
}
