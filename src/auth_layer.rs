use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, error, span, Instrument, Level};
use uuid::Uuid;

use crate::error::ApiError;
use crate::user_repo::UserRepository;
use crate::USER_ID_HEADER;

fn unauthorized() -> ApiError {
    ApiError::Unauthorized("Could not validate credentials".to_string())
}

/// Resolves the caller asserted by the upstream gateway and stores the `User`
/// in request extensions.
pub async fn user_auth_middleware<S>(
    State(state): State<Arc<S>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: UserRepository + Send + Sync + 'static,
{
    let span = span!(Level::DEBUG, "auth", uri = %request.uri());
    authenticate(state, request, next).instrument(span).await
}

async fn authenticate<S>(state: Arc<S>, mut request: Request, next: Next) -> Result<Response, ApiError>
where
    S: UserRepository + Send + Sync + 'static,
{
    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .ok_or_else(unauthorized)?
        .to_str()
        .map_err(|_| unauthorized())?;
    let user_id = Uuid::from_str(user_id.trim()).map_err(|_| unauthorized())?;

    let user = state
        .get_user(user_id)
        .await
        .map_err(|e| {
            error!("Couldn't load user for this request: {e}");
            ApiError::Internal(e)
        })?
        .ok_or_else(unauthorized)?;

    if !user.is_active {
        return Err(ApiError::bad_request("Inactive user"));
    }

    debug!("authenticated {}", user.id);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
