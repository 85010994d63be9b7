use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json, query::Query,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use plauder_common::model::{
    Id,
    post::{NewPost, PageLimit, Post, PostMarker, PostPage},
};
use plauder_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_get(list_my_posts)
        .typed_get(get_post)
        .typed_post(create_post)
        .typed_delete(delete_post)
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct PageParams {
    limit: Option<PageLimit>,
    cursor: Option<Id<PostMarker>>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn list_posts(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    Query(params): Query<PageParams>,
) -> Result<Json<PostPage>> {
    let limit = params.limit.unwrap_or_default();
    let page = db.fetch_post_page(None, limit, params.cursor).await?;

    Ok(Json(page))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/me/posts", rejection(ServerError))]
struct MyPostsPath();

async fn list_my_posts(
    MyPostsPath(): MyPostsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(params): Query<PageParams>,
) -> Result<Json<PostPage>> {
    let limit = params.limit.unwrap_or_default();
    let page = db
        .fetch_post_page(Some(user.user_id()), limit, params.cursor)
        .await?;

    Ok(Json(page))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostByIdPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostByIdPath { id }: PostByIdPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Post>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

async fn create_post(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(post): Json<NewPost>,
) -> Result<Json<Post>> {
    let post = db.create_post(user.user_id(), &post).await?;

    Ok(Json(post))
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
struct DeletedPost {
    id: Id<PostMarker>,
}

async fn delete_post(
    PostByIdPath { id }: PostByIdPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<DeletedPost>> {
    let author = db
        .fetch_post_author(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if author != user.user_id() {
        return Err(ServerError::NotPostAuthor(id));
    }

    db.delete_post(id).await?;

    Ok(Json(DeletedPost { id }))
}

#[cfg(test)]
mod tests {
    use crate::server::ServerError;
    use crate::server::auth::AuthenticatedUser;
    use crate::server::routes::posts::{PostByIdPath, delete_post};
    use crate::server::routes::testing::{connect, create_user};
    use axum::extract::State;
    use axum::http::StatusCode;
    use plauder_common::model::Id;
    use plauder_common::model::post::{NewPost, PostText};

    fn new_post(text: &str) -> NewPost {
        NewPost {
            text: PostText::new(text.into()).unwrap(),
        }
    }

    #[tokio::test]
    #[ignore = "requires a postgres instance via DATABASE_URL"]
    async fn only_the_author_may_delete_a_post() {
        let db = connect().await;
        let author = create_user(&db).await;
        let intruder = create_user(&db).await;
        let post = db.create_post(author, &new_post("mine")).await.unwrap();

        let rejection = delete_post(
            PostByIdPath { id: post.id },
            State(db.clone()),
            AuthenticatedUser::for_user(intruder),
        )
        .await
        .unwrap_err();

        assert!(matches!(rejection, ServerError::NotPostAuthor(id) if id == post.id));
        assert_eq!(rejection.status(), StatusCode::FORBIDDEN);
        assert!(db.fetch_post(post.id).await.unwrap().is_some());

        let deleted = delete_post(
            PostByIdPath { id: post.id },
            State(db.clone()),
            AuthenticatedUser::for_user(author),
        )
        .await
        .unwrap();

        assert_eq!(deleted.0.id, post.id);
        assert!(db.fetch_post(post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires a postgres instance via DATABASE_URL"]
    async fn deleting_an_unknown_post_is_not_found() {
        let db = connect().await;
        let user = create_user(&db).await;
        let unknown = Id::from(u64::MAX >> 1);

        let rejection = delete_post(
            PostByIdPath { id: unknown },
            State(db),
            AuthenticatedUser::for_user(user),
        )
        .await
        .unwrap_err();

        assert!(matches!(rejection, ServerError::PostByIdNotFound(_)));
        assert_eq!(rejection.status(), StatusCode::NOT_FOUND);
    }
}
