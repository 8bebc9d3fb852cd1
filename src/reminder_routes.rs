use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use tracing::debug;

use crate::error::{ApiError, ServerResult};
use crate::extractors::ApiJson;
use crate::reminder_models::{CustomReminder, PushToken, PushTokenRegister, ReminderCreate};
use crate::service::Repositories;
use crate::user_models::User;
use crate::validation::{self, TEXT_MAX};

pub fn router<S: Repositories>() -> Router<Arc<S>> {
    Router::new()
        .route("/notifications/token", post(register_push_token::<S>))
        .route("/reminders", get(list_reminders::<S>).post(schedule_reminder::<S>))
}

async fn register_push_token<S: Repositories>(
    State(state): State<Arc<S>>,
    Extension(me): Extension<User>,
    ApiJson(register): ApiJson<PushTokenRegister>,
) -> ServerResult<Json<PushToken>> {
    validation::required("expo_token", &register.expo_token, TEXT_MAX)?;
    let token = register.expo_token.trim();
    Ok(Json(state.upsert_push_token(me.id, token.to_string()).await?))
}

async fn schedule_reminder<S: Repositories>(
    State(state): State<Arc<S>>,
    Extension(me): Extension<User>,
    ApiJson(reminder_in): ApiJson<ReminderCreate>,
) -> ServerResult<Json<CustomReminder>> {
    validation::required("message", &reminder_in.message, TEXT_MAX)?;
    let message = reminder_in.message.trim();
    let expo_token = match reminder_in.expo_token.filter(|t| !t.trim().is_empty()) {
        Some(token) => {
            validation::bounded("expo_token", token.trim(), TEXT_MAX)?;
            token.trim().to_string()
        }
        None => state
            .push_token(me.id)
            .await?
            .map(|t| t.expo_token)
            .ok_or_else(|| ApiError::bad_request("No push token registered"))?,
    };
    let reminder = CustomReminder::new(me.id, expo_token, reminder_in.remind_time, message.to_string());
    let stored = state.schedule_reminder(reminder).await?;
    debug!("scheduled reminder {} for {}", stored.id, stored.remind_time);
    Ok(Json(stored))
}

async fn list_reminders<S: Repositories>(
    State(state): State<Arc<S>>,
    Extension(me): Extension<User>,
) -> ServerResult<Json<Vec<CustomReminder>>> {
    Ok(Json(state.user_reminders(me.id).await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::memory_repo::{call, MemoryState};
    use crate::router::app;

    #[tokio::test]
    async fn latest_push_token_wins_and_backs_reminders() {
        let state = Arc::new(MemoryState::default());
        let app = app(state.clone());
        let hal = state.add_user("hal@example.com", None);
        let reminder = json!({"remind_time": "2030-01-01T07:00:00Z", "message": "Morning mobility"});

        let (status, err) = call(&app, Method::POST, "/reminders", Some(hal.id), Some(reminder.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["detail"], "No push token registered");

        for token in ["ExponentPushToken[old]", "ExponentPushToken[new]"] {
            let (status, _) = call(
                &app,
                Method::POST,
                "/notifications/token",
                Some(hal.id),
                Some(json!({"expo_token": token})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, scheduled) = call(&app, Method::POST, "/reminders", Some(hal.id), Some(reminder)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(scheduled["expo_token"], "ExponentPushToken[new]");
        assert!(scheduled["sent_at"].is_null());

        let explicit = json!({
            "remind_time": "2029-06-01T18:30:00Z",
            "message": "Log weight",
            "expo_token": "ExponentPushToken[tablet]"
        });
        call(&app, Method::POST, "/reminders", Some(hal.id), Some(explicit)).await;

        let (_, listed) = call(&app, Method::GET, "/reminders", Some(hal.id), None).await;
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0]["message"], "Log weight");
        assert_eq!(listed[0]["expo_token"], "ExponentPushToken[tablet]");
    }

    #[tokio::test]
    async fn blank_reminder_message_is_rejected() {
        let state = Arc::new(MemoryState::default());
        let app = app(state.clone());
        let ivy = state.add_user("ivy@example.com", None);
        let body = json!({"remind_time": "2030-01-01T07:00:00Z", "message": "  ", "expo_token": "tok"});
        let (status, _) = call(&app, Method::POST, "/reminders", Some(ivy.id), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn over_long_reminder_fields_are_bad_requests() {
        let state = Arc::new(MemoryState::default());
        let app = app(state.clone());
        let jon = state.add_user("jon@example.com", None);

        let body = json!({"remind_time": "2030-01-01T07:00:00Z", "message": "m".repeat(300), "expo_token": "tok"});
        let (status, err) = call(&app, Method::POST, "/reminders", Some(jon.id), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["detail"], "message exceeds maximum length of 255 characters");

        let token = format!("ExponentPushToken[{}]", "x".repeat(255));
        let body = json!({"remind_time": "2030-01-01T07:00:00Z", "message": "stretch", "expo_token": token.clone()});
        let (status, _) = call(&app, Method::POST, "/reminders", Some(jon.id), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, Method::POST, "/notifications/token", Some(jon.id), Some(json!({"expo_token": token}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, listed) = call(&app, Method::GET, "/reminders", Some(jon.id), None).await;
        assert_eq!(listed, json!([]));
    }
}
