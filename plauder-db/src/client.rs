use crate::record::{PostRecord, ReplyRecord, UserRecord};
use plauder_common::model::post::{NewPost, PageLimit, Post, PostMarker, PostPage};
use plauder_common::model::reply::{NewReply, Reply, ReplyMarker};
use plauder_common::model::user::{ExternalId, User, UserMarker, UserProfile};
use plauder_common::model::{Id, ModelValidationError, PlauderSnowflakeGenerator};
use plauder_common::snowflake::{NodeId, SnowflakeTimeError};
use sqlx::PgPool;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not generate a snowflake id: {0}")]
    Snowflake(#[from] SnowflakeTimeError),
    #[error("Migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// All data access goes through one explicitly constructed `DbClient`.
/// Handlers receive it through the server state; nothing in the workspace
/// holds a global database handle.
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<PlauderSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, node_id: NodeId) -> Self {
        let snowflake_generator = Mutex::new(PlauderSnowflakeGenerator::new(node_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn connect(database_url: &str, node_id: NodeId) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool, node_id))
    }

    /// Creates the pool without establishing a connection. Connections are
    /// opened on first use, so this never fails on an unreachable server.
    pub fn connect_lazy(database_url: &str, node_id: NodeId) -> Result<Self> {
        let pool = PgPool::connect_lazy(database_url)?;
        Ok(Self::new(pool, node_id))
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(Id::new(snowflake))
    }

    pub async fn find_user_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<Id<UserMarker>>> {
        let user_id = sqlx::query_scalar::<_, i64>(
            "
            SELECT user_id FROM users WHERE external_id = $1
            ",
        )
        .bind(external_id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id.map(|id| id.cast_unsigned().into()))
    }

    /// Find-or-create backstop for lazy user creation. The unique
    /// constraint on `external_id` makes concurrent first sights of the
    /// same user converge on one row.
    pub async fn upsert_user(&self, profile: &UserProfile) -> Result<Id<UserMarker>> {
        let user_id: Id<UserMarker> = self.next_id()?;

        let returned_id = sqlx::query_scalar::<_, i64>(
            "
            INSERT INTO users (user_id, external_id, username, display_name, avatar_url)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO UPDATE SET external_id = EXCLUDED.external_id
            RETURNING user_id
            ",
        )
        .bind(u64::from(user_id).cast_signed())
        .bind(profile.external_id.get())
        .bind(profile.username.as_ref().map(|username| username.get()))
        .bind(profile.display_name.as_deref())
        .bind(profile.avatar_url.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(returned_id.cast_unsigned().into())
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "
            SELECT user_id, username, display_name, avatar_url
            FROM users
            WHERE user_id = $1
            ",
        )
        .bind(u64::from(user_id).cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = sqlx::query_as::<_, PostRecord>(
            "
            SELECT
                p.post_id, p.text, p.created_at, p.updated_at,
                (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.post_id) AS like_count,
                (SELECT COUNT(*) FROM replies r WHERE r.post_id = p.post_id) AS reply_count,
                u.user_id, u.username, u.display_name, u.avatar_url
            FROM posts p
            JOIN users u ON u.user_id = p.author_id
            WHERE p.post_id = $1
            ",
        )
        .bind(u64::from(post_id).cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    /// One feed page, newest first, ordered by `(created_at, post_id)`
    /// descending so pagination stays stable under equal timestamps. The
    /// cursor is the id of the last post of the previous page; a cursor
    /// whose post has since been deleted yields an empty page.
    pub async fn fetch_post_page(
        &self,
        author: Option<Id<UserMarker>>,
        limit: PageLimit,
        cursor: Option<Id<PostMarker>>,
    ) -> Result<PostPage> {
        let records = sqlx::query_as::<_, PostRecord>(
            "
            SELECT
                p.post_id, p.text, p.created_at, p.updated_at,
                (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.post_id) AS like_count,
                (SELECT COUNT(*) FROM replies r WHERE r.post_id = p.post_id) AS reply_count,
                u.user_id, u.username, u.display_name, u.avatar_url
            FROM posts p
            JOIN users u ON u.user_id = p.author_id
            WHERE ($1::BIGINT IS NULL OR p.author_id = $1)
              AND ($2::BIGINT IS NULL OR (p.created_at, p.post_id) <
                  (SELECT c.created_at, c.post_id FROM posts c WHERE c.post_id = $2))
            ORDER BY p.created_at DESC, p.post_id DESC
            LIMIT $3
            ",
        )
        .bind(author.map(|id| u64::from(id).cast_signed()))
        .bind(cursor.map(|id| u64::from(id).cast_signed()))
        .bind(i64::from(limit.get()) + 1)
        .fetch_all(&self.pool)
        .await?;

        let page = assemble_page(records, limit.get() as usize)?;
        Ok(page)
    }

    pub async fn create_post(&self, author: Id<UserMarker>, post: &NewPost) -> Result<Post> {
        let post_id: Id<PostMarker> = self.next_id()?;

        let record = sqlx::query_as::<_, PostRecord>(
            "
            WITH new_post AS (
                INSERT INTO posts (post_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING post_id, author_id, text, created_at, updated_at
            )
            SELECT
                np.post_id, np.text, np.created_at, np.updated_at,
                0::BIGINT AS like_count, 0::BIGINT AS reply_count,
                u.user_id, u.username, u.display_name, u.avatar_url
            FROM new_post np
            JOIN users u ON u.user_id = np.author_id
            ",
        )
        .bind(u64::from(post_id).cast_signed())
        .bind(u64::from(author).cast_signed())
        .bind(post.text.get())
        .fetch_one(&self.pool)
        .await?;

        let post = Post::try_from(record)?;
        Ok(post)
    }

    pub async fn fetch_post_author(
        &self,
        post_id: Id<PostMarker>,
    ) -> Result<Option<Id<UserMarker>>> {
        let author_id = sqlx::query_scalar::<_, i64>(
            "
            SELECT author_id FROM posts WHERE post_id = $1
            ",
        )
        .bind(u64::from(post_id).cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        Ok(author_id.map(|id| id.cast_unsigned().into()))
    }

    /// Deletes the post; likes and replies go with it via `ON DELETE
    /// CASCADE`. Ownership is checked by the caller.
    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<()> {
        sqlx::query("DELETE FROM posts WHERE post_id = $1")
            .bind(u64::from(post_id).cast_signed())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// All replies for a post, oldest first. An unknown post id yields an
    /// empty list, same as a post without replies.
    pub async fn fetch_replies(&self, post_id: Id<PostMarker>) -> Result<Vec<Reply>> {
        let records = sqlx::query_as::<_, ReplyRecord>(
            "
            SELECT
                r.reply_id, r.post_id, r.text, r.created_at, r.updated_at,
                u.user_id, u.username, u.display_name, u.avatar_url
            FROM replies r
            JOIN users u ON u.user_id = r.author_id
            WHERE r.post_id = $1
            ORDER BY r.created_at ASC, r.reply_id ASC
            ",
        )
        .bind(u64::from(post_id).cast_signed())
        .fetch_all(&self.pool)
        .await?;

        let replies = records
            .into_iter()
            .map(Reply::try_from)
            .collect::<Result<_, _>>()?;
        Ok(replies)
    }

    /// Returns `None` when the post does not exist (detected through the
    /// foreign key violation rather than a separate existence check).
    pub async fn create_reply(
        &self,
        author: Id<UserMarker>,
        post_id: Id<PostMarker>,
        reply: &NewReply,
    ) -> Result<Option<Reply>> {
        let reply_id: Id<ReplyMarker> = self.next_id()?;

        let query_result = sqlx::query_as::<_, ReplyRecord>(
            "
            WITH new_reply AS (
                INSERT INTO replies (reply_id, post_id, author_id, text)
                VALUES ($1, $2, $3, $4)
                RETURNING reply_id, post_id, author_id, text, created_at, updated_at
            )
            SELECT
                nr.reply_id, nr.post_id, nr.text, nr.created_at, nr.updated_at,
                u.user_id, u.username, u.display_name, u.avatar_url
            FROM new_reply nr
            JOIN users u ON u.user_id = nr.author_id
            ",
        )
        .bind(u64::from(reply_id).cast_signed())
        .bind(u64::from(post_id).cast_signed())
        .bind(u64::from(author).cast_signed())
        .bind(reply.text.get())
        .fetch_one(&self.pool)
        .await;

        let record = match query_result {
            Ok(record) => record,
            Err(sqlx::Error::Database(error)) if error.is_foreign_key_violation() => {
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };

        let reply = Reply::try_from(record)?;
        Ok(Some(reply))
    }

    pub async fn fetch_reply_author(
        &self,
        reply_id: Id<ReplyMarker>,
    ) -> Result<Option<Id<UserMarker>>> {
        let author_id = sqlx::query_scalar::<_, i64>(
            "
            SELECT author_id FROM replies WHERE reply_id = $1
            ",
        )
        .bind(u64::from(reply_id).cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        Ok(author_id.map(|id| id.cast_unsigned().into()))
    }

    pub async fn delete_reply(&self, reply_id: Id<ReplyMarker>) -> Result<()> {
        sqlx::query("DELETE FROM replies WHERE reply_id = $1")
            .bind(u64::from(reply_id).cast_signed())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Flips the caller's like on a post inside one transaction and
    /// returns the resulting state, or `None` when the post is unknown.
    ///
    /// The delete runs first so "currently liked" is decided by the row
    /// lock, not by a separate read. When two toggles race on the insert,
    /// `ON CONFLICT DO NOTHING` makes the loser report `liked` as well;
    /// the composite primary key keeps the table free of duplicates.
    pub async fn toggle_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<Option<bool>> {
        let mut tx = self.pool.begin().await?;

        let post_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE post_id = $1)",
        )
        .bind(u64::from(post_id).cast_signed())
        .fetch_one(&mut *tx)
        .await?;

        if !post_exists {
            return Ok(None);
        }

        let deleted = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(u64::from(user_id).cast_signed())
            .bind(u64::from(post_id).cast_signed())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted > 0 {
            tx.commit().await?;
            return Ok(Some(false));
        }

        sqlx::query(
            "
            INSERT INTO likes (user_id, post_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, post_id) DO NOTHING
            ",
        )
        .bind(u64::from(user_id).cast_signed())
        .bind(u64::from(post_id).cast_signed())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(true))
    }

    pub async fn fetch_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<bool> {
        let liked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(u64::from(user_id).cast_signed())
        .bind(u64::from(post_id).cast_signed())
        .fetch_one(&self.pool)
        .await?;

        Ok(liked)
    }

    /// The subset of `post_ids` the user currently likes.
    pub async fn fetch_liked_posts(
        &self,
        user_id: Id<UserMarker>,
        post_ids: &[Id<PostMarker>],
    ) -> Result<Vec<Id<PostMarker>>> {
        let db_post_ids: Vec<i64> = post_ids
            .iter()
            .map(|id| u64::from(*id).cast_signed())
            .collect();

        let liked = sqlx::query_scalar::<_, i64>(
            "
            SELECT post_id FROM likes
            WHERE user_id = $1 AND post_id = ANY($2)
            ",
        )
        .bind(u64::from(user_id).cast_signed())
        .bind(&db_post_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(liked
            .into_iter()
            .map(|id| id.cast_unsigned().into())
            .collect())
    }
}

/// Splits the `limit + 1` query result into a page: the extra row only
/// signals that another page exists and is not returned.
fn assemble_page(
    mut records: Vec<PostRecord>,
    limit: usize,
) -> Result<PostPage, ModelValidationError> {
    let next_cursor = if records.len() > limit {
        records.truncate(limit);
        records
            .last()
            .map(|record| record.post_id.cast_unsigned().into())
    } else {
        None
    };

    let items = records
        .into_iter()
        .map(Post::try_from)
        .collect::<Result<_, _>>()?;

    Ok(PostPage { items, next_cursor })
}

#[cfg(test)]
mod tests {
    use crate::client::assemble_page;
    use crate::record::PostRecord;
    use time::macros::datetime;

    fn record(post_id: i64) -> PostRecord {
        let created_at = datetime!(2025-05-01 12:00 UTC);
        PostRecord {
            post_id,
            text: "text".into(),
            created_at,
            updated_at: created_at,
            like_count: 0,
            reply_count: 0,
            user_id: 1,
            username: None,
            display_name: None,
            avatar_url: None,
        }
    }

    #[test]
    fn full_page_keeps_cursor_of_last_item() {
        let records = vec![record(5), record(4), record(3)];

        let page = assemble_page(records, 2).unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(u64::from(page.items[0].id), 5);
        assert_eq!(u64::from(page.items[1].id), 4);
        assert_eq!(page.next_cursor.map(u64::from), Some(4));
    }

    #[test]
    fn short_page_has_no_cursor() {
        let records = vec![record(5), record(4)];

        let page = assemble_page(records, 2).unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn empty_page() {
        let page = assemble_page(Vec::new(), 10).unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
    }
}
