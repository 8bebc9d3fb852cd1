use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, ServerResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery};
use crate::feed::{can_view_post, FeedParams, FeedType};
use crate::follow_repo::FollowDirection;
use crate::pagination::{PageParams, DEFAULT_SEARCH_LIMIT};
use crate::post_models::{WorkoutPost, WorkoutPostCreate, WorkoutPostPublic, WorkoutPostUpdate};
use crate::service::Repositories;
use crate::user_models::{Listing, Message, User, UserPublicExtended, UserSearchResult};

type ArcState<S> = State<Arc<S>>;

/// Routes mounted under `/social`.
pub fn router<S: Repositories>() -> Router<Arc<S>> {
    Router::new()
        .route("/follow/:user_id", post(follow_user::<S>))
        .route("/unfollow/:user_id", delete(unfollow_user::<S>))
        .route("/followers", get(get_followers::<S>))
        .route("/following", get(get_following::<S>))
        .route("/user/:user_id/followers", get(get_user_followers::<S>))
        .route("/user/:user_id/following", get(get_user_following::<S>))
        .route("/user/:user_id/profile", get(get_user_profile::<S>))
        .route("/user/:user_id/workout-posts", get(get_user_workout_posts::<S>))
        .route("/is-following/:user_id", get(check_if_following::<S>))
        .route("/users/search", get(search_users::<S>))
        .route(
            "/workout-posts",
            post(create_workout_post::<S>).get(get_my_workout_posts::<S>),
        )
        .route(
            "/workout-posts/:post_id",
            get(get_workout_post::<S>)
                .put(update_workout_post::<S>)
                .delete(delete_workout_post::<S>),
        )
        .route("/feed", get(get_feed::<S>))
        .route("/feed/public", get(get_public_feed::<S>))
        .route("/feed/personal", get(get_personal_feed::<S>))
}

async fn require_user<S: Repositories>(state: &S, user_id: Uuid) -> ServerResult<User> {
    state.get_user(user_id).await?.ok_or_else(ApiError::user_not_found)
}

/// Adds follower/following counts and the viewer's follow status to each user.
/// `is_following` is looked up unless the caller already knows it.
async fn with_social_stats<S: Repositories>(
    state: &S,
    viewer: &User,
    users: Vec<User>,
    known_following: Option<bool>,
) -> ServerResult<Vec<UserSearchResult>> {
    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let counts = state.follow_counts(&ids).await?;
    let following = match known_following {
        Some(_) => Default::default(),
        None => state.following_among(viewer.id, &ids).await?,
    };
    Ok(users
        .into_iter()
        .map(|user| {
            let user_counts = counts.get(&user.id).copied().unwrap_or_default();
            let is_following = known_following.unwrap_or_else(|| following.contains(&user.id));
            UserSearchResult {
                user,
                follower_count: user_counts.followers,
                following_count: user_counts.following,
                is_following,
            }
        })
        .collect())
}

/// Annotates posts with author names and the viewer's mutual-follow status,
/// computed fresh for this request.
async fn annotate_posts<S: Repositories>(
    state: &S,
    viewer: &User,
    posts: Vec<WorkoutPost>,
) -> ServerResult<Vec<WorkoutPostPublic>> {
    let mut authors: Vec<Uuid> = posts
        .iter()
        .map(|p| p.user_id)
        .filter(|id| *id != viewer.id)
        .collect();
    authors.sort();
    authors.dedup();

    let names: HashMap<Uuid, Option<String>> = state
        .users_by_ids(&authors)
        .await?
        .into_iter()
        .map(|u| (u.id, u.full_name))
        .collect();
    let mutual = state.mutual_among(viewer.id, &authors).await?;

    Ok(posts
        .into_iter()
        .map(|post| {
            let own = post.user_id == viewer.id;
            let user_full_name = if own {
                viewer.full_name.clone()
            } else {
                names.get(&post.user_id).cloned().flatten()
            };
            let is_mutual_follow = own || mutual.contains(&post.user_id);
            WorkoutPostPublic { post, user_full_name, is_mutual_follow }
        })
        .collect())
}

fn own_post(viewer: &User, post: WorkoutPost) -> WorkoutPostPublic {
    WorkoutPostPublic {
        post,
        user_full_name: viewer.full_name.clone(),
        is_mutual_follow: true,
    }
}

async fn follow_user<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ServerResult<Json<Message>> {
    if user_id == me.id {
        return Err(ApiError::bad_request("You cannot follow yourself"));
    }
    let target = require_user(state.as_ref(), user_id).await?;
    if !state.follow(me.id, user_id).await? {
        debug!("{} already follows {}", me.id, user_id);
    }
    Ok(Json(Message::new(format!("You are now following {}", target.display_name()))))
}

async fn unfollow_user<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ServerResult<Json<Message>> {
    if user_id == me.id {
        return Err(ApiError::bad_request("You cannot unfollow yourself"));
    }
    let target = require_user(state.as_ref(), user_id).await?;
    if !state.unfollow(me.id, user_id).await? {
        return Err(ApiError::bad_request(format!(
            "You are not following {}",
            target.display_name()
        )));
    }
    Ok(Json(Message::new(format!("You have unfollowed {}", target.display_name()))))
}

async fn get_followers<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ServerResult<Json<Listing<UserSearchResult>>> {
    let (followers, count) = state
        .profile_links(me.id, FollowDirection::FollowedBy, params.page())
        .await?;
    let data = with_social_stats(state.as_ref(), &me, followers, None).await?;
    Ok(Json(Listing { data, count }))
}

async fn get_following<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ServerResult<Json<Listing<UserSearchResult>>> {
    let (following, count) = state
        .profile_links(me.id, FollowDirection::Following, params.page())
        .await?;
    let data = with_social_stats(state.as_ref(), &me, following, Some(true)).await?;
    Ok(Json(Listing { data, count }))
}

async fn get_user_followers<S: Repositories>(
    State(state): ArcState<S>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ServerResult<Json<Listing<User>>> {
    require_user(state.as_ref(), user_id).await?;
    let (data, count) = state
        .profile_links(user_id, FollowDirection::FollowedBy, params.page())
        .await?;
    Ok(Json(Listing { data, count }))
}

async fn get_user_following<S: Repositories>(
    State(state): ArcState<S>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ServerResult<Json<Listing<User>>> {
    require_user(state.as_ref(), user_id).await?;
    let (data, count) = state
        .profile_links(user_id, FollowDirection::Following, params.page())
        .await?;
    Ok(Json(Listing { data, count }))
}

async fn get_user_profile<S: Repositories>(
    State(state): ArcState<S>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ServerResult<Json<UserPublicExtended>> {
    let user = require_user(state.as_ref(), user_id).await?;
    let counts = state.counts_for(user_id).await?;
    Ok(Json(UserPublicExtended {
        user,
        follower_count: counts.followers,
        following_count: counts.following,
    }))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct FollowStatus {
    pub is_following: bool,
}

async fn check_if_following<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ServerResult<Json<FollowStatus>> {
    require_user(state.as_ref(), user_id).await?;
    let is_following = state.is_following(me.id, user_id).await?;
    Ok(Json(FollowStatus { is_following }))
}

#[derive(Deserialize, Debug)]
pub struct SearchParams {
    q: Option<String>,
    skip: Option<i64>,
    limit: Option<i64>,
}

async fn search_users<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ServerResult<Json<Listing<UserSearchResult>>> {
    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::bad_request("Search query must be at least 1 character long"));
    }
    let page = PageParams { skip: params.skip, limit: params.limit }.page_with_default(DEFAULT_SEARCH_LIMIT);
    let (found, count) = state.search_users(query, me.id, page).await?;
    let data = with_social_stats(state.as_ref(), &me, found, None).await?;
    Ok(Json(Listing { data, count }))
}

async fn create_workout_post<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiJson(post_in): ApiJson<WorkoutPostCreate>,
) -> ServerResult<Json<WorkoutPostPublic>> {
    post_in.validate()?;
    let post = state.create_post(post_in.into_post(me.id)).await?;
    Ok(Json(own_post(&me, post)))
}

async fn get_my_workout_posts<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ServerResult<Json<Listing<WorkoutPostPublic>>> {
    let (posts, count) = state.user_posts(me.id, false, params.page()).await?;
    let data = posts.into_iter().map(|post| own_post(&me, post)).collect();
    Ok(Json(Listing { data, count }))
}

async fn get_user_workout_posts<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ServerResult<Json<Listing<WorkoutPostPublic>>> {
    let author = require_user(state.as_ref(), user_id).await?;
    let is_own = author.id == me.id;
    let is_mutual = !is_own && state.is_mutual(me.id, author.id).await?;
    // private posts only when the viewer may see every post
    let only_public = !can_view_post(is_own, false, is_mutual);

    let (posts, count) = state.user_posts(author.id, only_public, params.page()).await?;
    let data = posts
        .into_iter()
        .map(|post| WorkoutPostPublic {
            post,
            user_full_name: author.full_name.clone(),
            is_mutual_follow: is_own || is_mutual,
        })
        .collect();
    Ok(Json(Listing { data, count }))
}

async fn feed<S: Repositories>(
    state: &S,
    me: &User,
    feed_type: FeedType,
    params: PageParams,
) -> ServerResult<Json<Listing<WorkoutPostPublic>>> {
    let (posts, count) = state.feed_posts(me.id, feed_type, params.page()).await?;
    let data = annotate_posts(state, me, posts).await?;
    Ok(Json(Listing { data, count }))
}

async fn get_feed<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiQuery(params): ApiQuery<FeedParams>,
) -> ServerResult<Json<Listing<WorkoutPostPublic>>> {
    let feed_type = match params.feed_type.as_deref() {
        None => FeedType::default(),
        Some(raw) => raw
            .parse::<FeedType>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
    };
    let page = PageParams { skip: params.skip, limit: params.limit };
    feed(state.as_ref(), &me, feed_type, page).await
}

async fn get_public_feed<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ServerResult<Json<Listing<WorkoutPostPublic>>> {
    feed(state.as_ref(), &me, FeedType::Public, params).await
}

async fn get_personal_feed<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ServerResult<Json<Listing<WorkoutPostPublic>>> {
    feed(state.as_ref(), &me, FeedType::Personal, params).await
}

async fn get_workout_post<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ServerResult<Json<WorkoutPostPublic>> {
    let post = state.get_post(post_id).await?.ok_or_else(ApiError::post_not_found)?;
    let is_own = post.user_id == me.id;
    let is_mutual = !is_own && state.is_mutual(me.id, post.user_id).await?;
    // invisible posts look the same as missing ones
    if !can_view_post(is_own, post.is_public, is_mutual) {
        return Err(ApiError::post_not_found());
    }
    let user_full_name = if is_own {
        me.full_name.clone()
    } else {
        state.get_user(post.user_id).await?.and_then(|u| u.full_name)
    };
    Ok(Json(WorkoutPostPublic {
        post,
        user_full_name,
        is_mutual_follow: is_own || is_mutual,
    }))
}

async fn update_workout_post<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(post_in): ApiJson<WorkoutPostUpdate>,
) -> ServerResult<Json<WorkoutPostPublic>> {
    let post = state.get_post(post_id).await?.ok_or_else(ApiError::post_not_found)?;
    if post.user_id != me.id {
        return Err(ApiError::forbidden());
    }
    let post_in = post_in.trimmed();
    post_in.validate()?;
    let updated = state.update_post(post.id, post_in).await?;
    Ok(Json(own_post(&me, updated)))
}

async fn delete_workout_post<S: Repositories>(
    State(state): ArcState<S>,
    Extension(me): Extension<User>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ServerResult<Json<Message>> {
    let post = state.get_post(post_id).await?.ok_or_else(ApiError::post_not_found)?;
    if !me.is_superuser && post.user_id != me.id {
        return Err(ApiError::forbidden());
    }
    state.delete_post(post.id).await?;
    Ok(Json(Message::new("Workout post deleted successfully")))
}
