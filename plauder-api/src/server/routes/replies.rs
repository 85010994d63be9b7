use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use plauder_common::model::{
    Id,
    post::PostMarker,
    reply::{NewReply, Reply, ReplyMarker},
};
use plauder_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_replies)
        .typed_post(create_reply)
        .typed_delete(delete_reply)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/replies", rejection(ServerError))]
struct PostRepliesPath {
    id: Id<PostMarker>,
}

async fn list_replies(
    PostRepliesPath { id }: PostRepliesPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Reply>>> {
    let replies = db.fetch_replies(id).await?;

    Ok(Json(replies))
}

async fn create_reply(
    PostRepliesPath { id }: PostRepliesPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(reply): Json<NewReply>,
) -> Result<Json<Reply>> {
    let reply = db
        .create_reply(user.user_id(), id, &reply)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(reply))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/replies/{id}", rejection(ServerError))]
struct ReplyByIdPath {
    id: Id<ReplyMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
struct ReplyDeleted {
    success: bool,
}

async fn delete_reply(
    ReplyByIdPath { id }: ReplyByIdPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<ReplyDeleted>> {
    let author = db
        .fetch_reply_author(id)
        .await?
        .ok_or(ServerError::ReplyByIdNotFound(id))?;

    if author != user.user_id() {
        return Err(ServerError::NotReplyAuthor(id));
    }

    db.delete_reply(id).await?;

    Ok(Json(ReplyDeleted { success: true }))
}

#[cfg(test)]
mod tests {
    use crate::server::ServerError;
    use crate::server::auth::AuthenticatedUser;
    use crate::server::routes::replies::{ReplyByIdPath, delete_reply};
    use crate::server::routes::testing::{connect, create_user};
    use axum::extract::State;
    use axum::http::StatusCode;
    use plauder_common::model::Id;
    use plauder_common::model::post::{NewPost, PostText};
    use plauder_common::model::reply::{NewReply, Reply, ReplyText};
    use plauder_common::model::user::UserMarker;
    use plauder_db::client::DbClient;

    async fn seed_reply(db: &DbClient, author: Id<UserMarker>) -> Reply {
        let post = db
            .create_post(
                author,
                &NewPost {
                    text: PostText::new("discuss".into()).unwrap(),
                },
            )
            .await
            .unwrap();

        db.create_reply(
            author,
            post.id,
            &NewReply {
                text: ReplyText::new("a reply".into()).unwrap(),
            },
        )
        .await
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a postgres instance via DATABASE_URL"]
    async fn only_the_author_may_delete_a_reply() {
        let db = connect().await;
        let author = create_user(&db).await;
        let intruder = create_user(&db).await;
        let reply = seed_reply(&db, author).await;

        let rejection = delete_reply(
            ReplyByIdPath { id: reply.id },
            State(db.clone()),
            AuthenticatedUser::for_user(intruder),
        )
        .await
        .unwrap_err();

        assert!(matches!(rejection, ServerError::NotReplyAuthor(id) if id == reply.id));
        assert_eq!(rejection.status(), StatusCode::FORBIDDEN);
        assert!(!db.fetch_replies(reply.post_id).await.unwrap().is_empty());

        let deleted = delete_reply(
            ReplyByIdPath { id: reply.id },
            State(db.clone()),
            AuthenticatedUser::for_user(author),
        )
        .await
        .unwrap();

        assert!(deleted.0.success);
        assert!(db.fetch_replies(reply.post_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a postgres instance via DATABASE_URL"]
    async fn deleting_an_unknown_reply_is_not_found() {
        let db = connect().await;
        let user = create_user(&db).await;
        let unknown = Id::from(u64::MAX >> 1);

        let rejection = delete_reply(
            ReplyByIdPath { id: unknown },
            State(db),
            AuthenticatedUser::for_user(user),
        )
        .await
        .unwrap_err();

        assert!(matches!(rejection, ServerError::ReplyByIdNotFound(_)));
        assert_eq!(rejection.status(), StatusCode::NOT_FOUND);
    }
}
