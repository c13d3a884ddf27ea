//! HTTP handlers for the `/users` resource.

use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Json,
};
use roster_types::{User, UserFilter};
use roster_users::UserError;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Pagination parameters for the listing endpoint. Zero/absent means unset.
#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Maps a [`UserError`] to the right HTTP status, reporting unexpected ones.
///
/// Validation → 400, not-found → 404, everything else → 500 (logged and sent
/// to the injected reporter).
fn user_err_to_status(state: &AppState, e: UserError) -> StatusCode {
    match e {
        UserError::Validation(_) => StatusCode::BAD_REQUEST,
        UserError::NotFound(_) => StatusCode::NOT_FOUND,
        err => {
            tracing::error!(error = %err, "user operation failed");
            state.reporter.report(&err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// POST /users
pub async fn create_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(mut user): Json<User>,
) -> Result<(StatusCode, Json<User>), StatusCode> {
    match state.users.create_user(&mut user).await {
        Ok(()) => Ok((StatusCode::CREATED, Json(user))),
        Err(e) => Err(user_err_to_status(&state, e)),
    }
}

/// GET /users/{id}
pub async fn get_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<User>, StatusCode> {
    state
        .users
        .find_user_by_id(id)
        .await
        .map(Json)
        .map_err(|e| user_err_to_status(&state, e))
}

/// GET /users?limit=&offset=
pub async fn list_users_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let filter = UserFilter {
        id: None,
        offset: params.offset,
        limit: params.limit,
    };

    let (users, total) = state
        .users
        .find_users(filter)
        .await
        .map_err(|e| user_err_to_status(&state, e))?;

    Ok(Json(json!({
        "users": users,
        "total": total,
    })))
}
