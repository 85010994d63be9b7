use crate::model::{Id, post::PostMarker, user::User};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ReplyMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Reply {
    pub id: Id<ReplyMarker>,
    pub post_id: Id<PostMarker>,
    pub author: User,
    pub text: ReplyText,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct NewReply {
    pub text: ReplyText,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct ReplyText(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Reply text must not be empty")]
pub struct EmptyReplyTextError;

impl ReplyText {
    pub fn new(text: String) -> Result<Self, EmptyReplyTextError> {
        if text.is_empty() {
            Err(EmptyReplyTextError)
        } else {
            Ok(ReplyText(text))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for ReplyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        ReplyText::new(inner)
            .map_err(|_| Error::invalid_value(Unexpected::Str(""), &"non-empty reply text"))
    }
}
