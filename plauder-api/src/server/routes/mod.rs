use crate::server::{ServerError, ServerRouter, json::Json};
use axum::Router;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;

mod likes;
mod posts;
mod replies;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(health)
        .merge(posts::routes())
        .merge(replies::routes())
        .merge(likes::routes())
        .merge(users::routes())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/health", rejection(ServerError))]
struct HealthPath();

/// Liveness check; answers as soon as the server accepts requests.
async fn health(HealthPath(): HealthPath) -> Json<&'static str> {
    Json("yay!")
}

/// Helpers for handler tests that run against a real database.
#[cfg(test)]
pub(crate) mod testing {
    use plauder_common::model::Id;
    use plauder_common::model::user::{ExternalId, UserMarker, UserProfile};
    use plauder_common::snowflake::NodeId;
    use plauder_db::client::DbClient;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn unique_external_id() -> ExternalId {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        ExternalId::new(format!("handler-test-{nanos}-{count}")).unwrap()
    }

    pub async fn connect() -> Arc<DbClient> {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let client = DbClient::connect(&database_url, NodeId::new_unchecked(2))
            .await
            .unwrap();
        client.run_migrations().await.unwrap();
        Arc::new(client)
    }

    pub async fn create_user(db: &DbClient) -> Id<UserMarker> {
        let profile = UserProfile {
            external_id: unique_external_id(),
            username: None,
            display_name: None,
            avatar_url: None,
        };
        db.upsert_user(&profile).await.unwrap()
    }
}
