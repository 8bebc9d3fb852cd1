use axum::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use eyre::Result;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::ServerError;
use crate::fitness_models::{Exercise, PersonalBest, PersonalBestCreate};
use crate::schema::personal_bests;
use crate::service::ServiceState;

/// Exercise names (lower case) we keep personal bests for, and their metric keys.
pub const TRACKED_EXERCISES: [(&str, &str); 5] = [
    ("bench press", "bench-press"),
    ("squat", "squat"),
    ("deadlift", "deadlift"),
    ("push-ups", "pushups"),
    ("pull-ups", "pullups"),
];

pub fn metric_for_exercise(name: &str) -> Option<&'static str> {
    let name = name.trim().to_lowercase();
    TRACKED_EXERCISES
        .iter()
        .find(|(exercise, _)| *exercise == name)
        .map(|(_, metric)| *metric)
}

/// weight x reps, floored at zero.
pub fn exercise_value(exercise: &Exercise) -> f64 {
    let value = exercise.weight.unwrap_or(0.0) * f64::from(exercise.reps.unwrap_or(0));
    if value > 0.0 { value } else { 0.0 }
}

/// Personal-best candidates from a workout's exercises; untracked ones are skipped.
pub fn candidates_from_exercises(exercises: &[Exercise], date: NaiveDate) -> Vec<PersonalBestCreate> {
    exercises
        .iter()
        .filter_map(|exercise| {
            metric_for_exercise(&exercise.name).map(|metric| PersonalBestCreate {
                metric: metric.to_string(),
                value: exercise_value(exercise),
                date: Some(date),
            })
        })
        .collect()
}

/// Outcome of offering a value for an existing best.
#[derive(Debug, Clone, PartialEq)]
pub enum BestUpdate {
    Insert(PersonalBest),
    Replace(PersonalBest),
    Keep(PersonalBest),
}

/// Only a strictly greater value replaces the stored one.
pub fn resolve_best(existing: Option<PersonalBest>, user_id: Uuid, candidate: &PersonalBestCreate) -> BestUpdate {
    let date = candidate.date.unwrap_or_else(|| Utc::now().date_naive());
    match existing {
        None => BestUpdate::Insert(PersonalBest {
            id: Uuid::new_v4(),
            user_id,
            metric: candidate.metric.clone(),
            value: candidate.value,
            date,
        }),
        Some(best) if candidate.value > best.value => BestUpdate::Replace(PersonalBest {
            value: candidate.value,
            date,
            ..best
        }),
        Some(best) => BestUpdate::Keep(best),
    }
}

/// Offers `candidate` inside an open transaction; the stored row is locked while compared.
pub fn upsert_best_in(db: &mut PgConnection, user_id: Uuid, candidate: &PersonalBestCreate) -> QueryResult<PersonalBest> {
    let existing = personal_bests::table
        .select(PersonalBest::as_select())
        .filter(personal_bests::user_id.eq(user_id))
        .filter(personal_bests::metric.eq(&candidate.metric))
        .for_update()
        .get_result(db)
        .optional()?;
    match resolve_best(existing, user_id, candidate) {
        BestUpdate::Insert(best) => diesel::insert_into(personal_bests::table)
            .values(&best)
            .returning(PersonalBest::as_returning())
            .get_result(db),
        BestUpdate::Replace(best) => diesel::update(personal_bests::table.filter(personal_bests::id.eq(best.id)))
            .set((
                personal_bests::value.eq(best.value),
                personal_bests::date.eq(best.date),
            ))
            .returning(PersonalBest::as_returning())
            .get_result(db),
        BestUpdate::Keep(best) => Ok(best),
    }
}

/// Runs `attempt` once more when it lost an insert race on a unique key.
/// `FOR UPDATE` can't lock a row that doesn't exist yet, so two first offers
/// for the same metric may both try to insert; the retry sees the winner's row.
pub fn retry_unique_violation<T>(mut attempt: impl FnMut() -> QueryResult<T>) -> QueryResult<T> {
    match attempt() {
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            debug!("lost a unique key race, retrying");
            attempt()
        }
        other => other,
    }
}

#[async_trait]
pub trait PersonalBestRepository {
    /// Stores `candidate` if it beats the current best; returns the best after the call.
    async fn upsert_personal_best(&self, user_id: Uuid, candidate: PersonalBestCreate) -> Result<PersonalBest>;
    async fn personal_bests(&self, user_id: Uuid) -> Result<Vec<PersonalBest>>;
    async fn personal_best(&self, user_id: Uuid, metric: &str) -> Result<Option<PersonalBest>>;
}

#[async_trait]
impl PersonalBestRepository for ServiceState {
    async fn upsert_personal_best(&self, user_id: Uuid, candidate: PersonalBestCreate) -> Result<PersonalBest> {
        let mut db = self.db_pool.get()?;
        let best = retry_unique_violation(|| {
            db.transaction::<_, DieselError, _>(|db| upsert_best_in(db, user_id, &candidate))
        })
        .map_err(|e| {
            error!("Error storing personal best: {e}");
            ServerError::DbError
        })?;
        debug!("personal best for {user_id} on {}: {}", best.metric, best.value);
        Ok(best)
    }

    async fn personal_bests(&self, user_id: Uuid) -> Result<Vec<PersonalBest>> {
        let mut db = self.db_pool.get()?;
        let bests = personal_bests::table
            .select(PersonalBest::as_select())
            .filter(personal_bests::user_id.eq(user_id))
            .order(personal_bests::metric.asc())
            .load(&mut db)?;
        Ok(bests)
    }

    async fn personal_best(&self, user_id: Uuid, metric: &str) -> Result<Option<PersonalBest>> {
        let mut db = self.db_pool.get()?;
        let best = personal_bests::table
            .select(PersonalBest::as_select())
            .filter(personal_bests::user_id.eq(user_id))
            .filter(personal_bests::metric.eq(metric))
            .get_result(&mut db)
            .optional()?;
        Ok(best)
    }
}
