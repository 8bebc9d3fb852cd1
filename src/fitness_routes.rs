use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};

use crate::error::{ApiError, ServerResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery};
use crate::fitness_models::{PersonalBest, PersonalBestCreate, WorkoutCreate, WorkoutWithExercises};
use crate::pagination::PageParams;
use crate::service::Repositories;
use crate::user_models::{Listing, User};

pub fn router<S: Repositories>() -> Router<Arc<S>> {
    Router::new()
        .route("/workouts", get(list_workouts::<S>).post(create_workout::<S>))
        .route(
            "/personal-bests",
            get(list_personal_bests::<S>).post(submit_personal_best::<S>),
        )
        .route("/personal-bests/:metric", get(get_personal_best::<S>))
}

/// Logs a workout and folds its tracked exercises into the user's personal bests.
async fn create_workout<S: Repositories>(
    State(state): State<Arc<S>>,
    Extension(me): Extension<User>,
    ApiJson(workout_in): ApiJson<WorkoutCreate>,
) -> ServerResult<Json<WorkoutWithExercises>> {
    workout_in.validate()?;
    let (workout, exercises) = workout_in.into_rows(me.id);
    Ok(Json(state.create_workout(workout, exercises).await?))
}

async fn list_workouts<S: Repositories>(
    State(state): State<Arc<S>>,
    Extension(me): Extension<User>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ServerResult<Json<Listing<WorkoutWithExercises>>> {
    let (data, count) = state.user_workouts(me.id, params.page()).await?;
    Ok(Json(Listing { data, count }))
}

async fn list_personal_bests<S: Repositories>(
    State(state): State<Arc<S>>,
    Extension(me): Extension<User>,
) -> ServerResult<Json<Vec<PersonalBest>>> {
    Ok(Json(state.personal_bests(me.id).await?))
}

async fn get_personal_best<S: Repositories>(
    State(state): State<Arc<S>>,
    Extension(me): Extension<User>,
    ApiPath(metric): ApiPath<String>,
) -> ServerResult<Json<PersonalBest>> {
    state
        .personal_best(me.id, &metric)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Personal best not found"))
}

async fn submit_personal_best<S: Repositories>(
    State(state): State<Arc<S>>,
    Extension(me): Extension<User>,
    ApiJson(mut best_in): ApiJson<PersonalBestCreate>,
) -> ServerResult<Json<PersonalBest>> {
    best_in.validate()?;
    best_in.metric = best_in.metric.trim().to_string();
    Ok(Json(state.upsert_personal_best(me.id, best_in).await?))
}
