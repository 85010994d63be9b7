use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{AuthenticatedUser, MaybeAuthenticatedUser},
    json::Json,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use plauder_common::model::{Id, like::LikeState, post::PostMarker};
use plauder_db::client::DbClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(toggle_like)
        .typed_get(get_like)
        .typed_post(lookup_likes)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct PostLikePath {
    id: Id<PostMarker>,
}

async fn toggle_like(
    PostLikePath { id }: PostLikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeState>> {
    let liked = db
        .toggle_like(user.user_id(), id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(LikeState { liked }))
}

async fn get_like(
    PostLikePath { id }: PostLikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeState>> {
    let liked = db.fetch_like(user.user_id(), id).await?;

    Ok(Json(LikeState { liked }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/likes/lookup", rejection(ServerError))]
struct LikesLookupPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct LikesLookupRequest {
    post_ids: Vec<Id<PostMarker>>,
}

/// Liked posts map to `true`; everything else is simply absent. Anonymous
/// callers and empty inputs short-circuit to an empty map without touching
/// the database.
async fn lookup_likes(
    LikesLookupPath(): LikesLookupPath,
    State(db): State<Arc<DbClient>>,
    MaybeAuthenticatedUser(user): MaybeAuthenticatedUser,
    Json(request): Json<LikesLookupRequest>,
) -> Result<Json<HashMap<Id<PostMarker>, bool>>> {
    let Some(user) = user else {
        return Ok(Json(HashMap::new()));
    };
    if request.post_ids.is_empty() {
        return Ok(Json(HashMap::new()));
    }

    let liked = db
        .fetch_liked_posts(user.user_id(), &request.post_ids)
        .await?;

    Ok(Json(liked.into_iter().map(|id| (id, true)).collect()))
}

#[cfg(test)]
mod tests {
    use crate::server::auth::{AuthenticatedUser, MaybeAuthenticatedUser};
    use crate::server::json::Json;
    use crate::server::routes::likes::{LikesLookupPath, LikesLookupRequest, lookup_likes};
    use axum::extract::State;
    use plauder_common::model::Id;
    use plauder_common::snowflake::NodeId;
    use plauder_db::client::DbClient;
    use std::sync::Arc;

    /// Lazily-connected pool: the handler must return before any query.
    fn unreachable_db() -> Arc<DbClient> {
        Arc::new(
            DbClient::connect_lazy("postgres://localhost/unreachable", NodeId::new_unchecked(0))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn anonymous_lookup_short_circuits() {
        let Json(map) = lookup_likes(
            LikesLookupPath(),
            State(unreachable_db()),
            MaybeAuthenticatedUser(None),
            Json(LikesLookupRequest {
                post_ids: vec![Id::from(1), Id::from(2)],
            }),
        )
        .await
        .unwrap();

        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let Json(map) = lookup_likes(
            LikesLookupPath(),
            State(unreachable_db()),
            MaybeAuthenticatedUser(Some(AuthenticatedUser::default())),
            Json(LikesLookupRequest {
                post_ids: Vec::new(),
            }),
        )
        .await
        .unwrap();

        assert!(map.is_empty());
    }
}
