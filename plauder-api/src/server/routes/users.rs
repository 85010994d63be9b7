use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use plauder_common::model::user::User;
use plauder_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(sync_user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/sync", rejection(ServerError))]
struct SyncUserPath();

/// The extractor has already upserted the caller on first sight, so this
/// is a plain read-back of the current row.
async fn sync_user(
    SyncUserPath(): SyncUserPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Option<User>>> {
    let user = db.fetch_user(user.user_id()).await?;

    Ok(Json(user))
}
