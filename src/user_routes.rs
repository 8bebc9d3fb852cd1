use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};
use tracing::debug;

use crate::error::{ApiError, ServerResult};
use crate::extractors::ApiJson;
use crate::service::Repositories;
use crate::user_models::{normalize_email, NewUser, User, UserRegister, UserUpdateMe};
use crate::validation::{self, GENDER_MAX, TEXT_MAX};

/// Authenticated account routes; signup is mounted separately without auth.
pub fn router<S: Repositories>() -> Router<Arc<S>> {
    Router::new().route("/users/me", get(read_user_me).patch(update_user_me::<S>))
}

fn check_email(email: &str) -> ServerResult<()> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(ApiError::bad_request("A valid email address is required"));
    }
    validation::bounded("email", email, TEXT_MAX)?;
    Ok(())
}

fn check_profile(full_name: Option<&str>, gender: Option<&str>) -> ServerResult<()> {
    validation::optional("full_name", full_name, TEXT_MAX)?;
    validation::optional("gender", gender, GENDER_MAX)?;
    Ok(())
}

pub async fn register_user<S: Repositories>(
    State(state): State<Arc<S>>,
    ApiJson(register): ApiJson<UserRegister>,
) -> ServerResult<Json<User>> {
    let new_user = NewUser::from_register(register);
    check_email(&new_user.email)?;
    check_profile(new_user.full_name.as_deref(), new_user.gender.as_deref())?;
    if state.get_user_by_email(&new_user.email).await?.is_some() {
        return Err(ApiError::bad_request(
            "The user with this email already exists in the system",
        ));
    }
    let user = state.create_user(new_user).await?;
    debug!("registered {}", user.id);
    Ok(Json(user))
}

async fn read_user_me(Extension(me): Extension<User>) -> Json<User> {
    Json(me)
}

async fn update_user_me<S: Repositories>(
    State(state): State<Arc<S>>,
    Extension(me): Extension<User>,
    ApiJson(mut changes): ApiJson<UserUpdateMe>,
) -> ServerResult<Json<User>> {
    check_profile(changes.full_name.as_deref(), changes.gender.as_deref())?;
    if let Some(email) = changes.email.take() {
        let email = normalize_email(&email);
        check_email(&email)?;
        if let Some(owner) = state.get_user_by_email(&email).await? {
            if owner.id != me.id {
                return Err(ApiError::bad_request("User with this email already exists"));
            }
        }
        changes.email = Some(email);
    }
    let user = state.update_user(me.id, changes).await?;
    Ok(Json(user))
}
