use axum::async_trait;
use diesel::prelude::*;
use eyre::Result;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::ServerError;
use crate::fitness_models::{Exercise, Workout, WorkoutWithExercises};
use crate::pagination::Page;
use crate::pbest_repo::{candidates_from_exercises, retry_unique_violation, upsert_best_in};
use crate::schema::{exercises, workouts};
use crate::service::ServiceState;

#[async_trait]
pub trait WorkoutRepository {
    /// Stores the workout and its exercises and folds tracked exercises into
    /// the owner's personal bests, all or nothing.
    async fn create_workout(&self, workout: Workout, exercises: Vec<Exercise>) -> Result<WorkoutWithExercises>;
    async fn user_workouts(&self, user_id: Uuid, page: Page) -> Result<(Vec<WorkoutWithExercises>, i64)>;
}

#[async_trait]
impl WorkoutRepository for ServiceState {
    async fn create_workout(&self, workout: Workout, new_exercises: Vec<Exercise>) -> Result<WorkoutWithExercises> {
        let mut db = self.db_pool.get()?;
        let created = retry_unique_violation(|| {
            db.transaction::<_, diesel::result::Error, _>(|db| {
                let workout = diesel::insert_into(workouts::table)
                    .values(&workout)
                    .returning(Workout::as_returning())
                    .get_result(db)?;
                if new_exercises.is_empty() {
                    return Ok(WorkoutWithExercises { workout, exercises: vec![] });
                }
                let stored = diesel::insert_into(exercises::table)
                    .values(&new_exercises)
                    .returning(Exercise::as_returning())
                    .get_results(db)?;
                for candidate in candidates_from_exercises(&stored, workout.date) {
                    upsert_best_in(db, workout.user_id, &candidate)?;
                }
                Ok(WorkoutWithExercises { workout, exercises: stored })
            })
        })
        .map_err(|e| {
            error!("Error inserting workout: {e}");
            ServerError::DbError
        })?;
        debug!("user {} logged workout {}", created.workout.user_id, created.workout.id);
        Ok(created)
    }

    async fn user_workouts(&self, user_id: Uuid, page: Page) -> Result<(Vec<WorkoutWithExercises>, i64)> {
        let mut db = self.db_pool.get()?;
        let total = workouts::table
            .filter(workouts::user_id.eq(user_id))
            .count()
            .get_result::<i64>(&mut db)?;
        let found = workouts::table
            .select(Workout::as_select())
            .filter(workouts::user_id.eq(user_id))
            .order((workouts::date.desc(), workouts::created_at.desc()))
            .offset(page.offset)
            .limit(page.limit)
            .load(&mut db)?;
        let children = Exercise::belonging_to(&found)
            .select(Exercise::as_select())
            .load(&mut db)?
            .grouped_by(&found);
        let listed = found
            .into_iter()
            .zip(children)
            .map(|(workout, exercises)| WorkoutWithExercises { workout, exercises })
            .collect();
        Ok((listed, total))
    }
}
