use plauder_common::model::ModelValidationError;
use plauder_common::model::post::{Post, PostText};
use plauder_common::model::reply::{Reply, ReplyText};
use plauder_common::model::user::{User, Username};
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, sqlx::FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, sqlx::FromRow)]
pub(crate) struct PostRecord {
    pub post_id: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub like_count: i64,
    pub reply_count: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, sqlx::FromRow)]
pub(crate) struct ReplyRecord {
    pub reply_id: i64,
    pub post_id: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_id: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

fn user_from_columns(
    user_id: i64,
    username: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
) -> Result<User, ModelValidationError> {
    Ok(User {
        id: user_id.cast_unsigned().into(),
        username: username.map(Username::new).transpose()?,
        display_name,
        avatar_url,
    })
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        user_from_columns(
            value.user_id,
            value.username,
            value.display_name,
            value.avatar_url,
        )
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_id.cast_unsigned().into(),
            author: user_from_columns(
                value.user_id,
                value.username,
                value.display_name,
                value.avatar_url,
            )?,
            text: PostText::new(value.text)?,
            created_at: value.created_at.to_utc(),
            updated_at: value.updated_at.to_utc(),
            like_count: value.like_count.cast_unsigned(),
            reply_count: value.reply_count.cast_unsigned(),
        })
    }
}

impl TryFrom<ReplyRecord> for Reply {
    type Error = ModelValidationError;

    fn try_from(value: ReplyRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.reply_id.cast_unsigned().into(),
            post_id: value.post_id.cast_unsigned().into(),
            author: user_from_columns(
                value.user_id,
                value.username,
                value.display_name,
                value.avatar_url,
            )?,
            text: ReplyText::new(value.text)?,
            created_at: value.created_at.to_utc(),
            updated_at: value.updated_at.to_utc(),
        })
    }
}
