use crate::model::{Id, user::User};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

pub const PAGE_LIMIT_MAX: u32 = 50;
pub const PAGE_LIMIT_DEFAULT: u32 = 10;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: User,
    pub text: PostText,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
    pub like_count: u64,
    pub reply_count: u64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct NewPost {
    pub text: PostText,
}

/// One page of the reverse-chronological feed. `next_cursor` is the id of
/// the last returned post and is absent on the final page.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostPage {
    pub items: Vec<Post>,
    pub next_cursor: Option<Id<PostMarker>>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct PostText(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Post text must not be empty")]
pub struct EmptyPostTextError;

impl PostText {
    pub fn new(text: String) -> Result<Self, EmptyPostTextError> {
        if text.is_empty() {
            Err(EmptyPostTextError)
        } else {
            Ok(PostText(text))
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

impl<'de> Deserialize<'de> for PostText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostText::new(inner)
            .map_err(|_| Error::invalid_value(Unexpected::Str(""), &"non-empty post text"))
    }
}

/// Page size for the feed queries, clamped to `1..=PAGE_LIMIT_MAX` at the
/// type level so handlers never see an out-of-range limit.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct PageLimit(u32);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The page limit is out of range: {0}")]
pub struct PageLimitOutOfRangeError(u32);

impl PageLimit {
    #[must_use]
    pub fn new(limit: u32) -> Option<Self> {
        (1..=PAGE_LIMIT_MAX).contains(&limit).then_some(Self(limit))
    }

    #[must_use]
    pub fn new_unchecked(limit: u32) -> Self {
        Self::new(limit).expect("PageLimit out of range.")
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for PageLimit {
    fn default() -> Self {
        Self(PAGE_LIMIT_DEFAULT)
    }
}

impl TryFrom<u32> for PageLimit {
    type Error = PageLimitOutOfRangeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PageLimitOutOfRangeError(value))
    }
}

impl<'de> Deserialize<'de> for PageLimit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = u32::deserialize(deserializer)?;
        Self::new(inner)
            .ok_or_else(|| Error::invalid_value(Unexpected::Unsigned(inner.into()), &"PageLimit"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::post::{PAGE_LIMIT_MAX, PageLimit, PostText};

    #[test]
    fn post_text_must_not_be_empty() {
        assert!(PostText::new(String::new()).is_err());
        assert_eq!(PostText::new("hello".into()).unwrap().get(), "hello");
    }

    #[test]
    fn page_limit_bounds() {
        assert!(PageLimit::new(0).is_none());
        assert!(PageLimit::new(1).is_some());
        assert!(PageLimit::new(PAGE_LIMIT_MAX).is_some());
        assert!(PageLimit::new(PAGE_LIMIT_MAX + 1).is_none());
    }

    #[test]
    fn page_limit_deserializes_with_bounds() {
        assert_eq!(
            serde_json::from_str::<PageLimit>("10").unwrap(),
            PageLimit::new_unchecked(10)
        );
        assert!(serde_json::from_str::<PageLimit>("0").is_err());
        assert!(serde_json::from_str::<PageLimit>("51").is_err());
    }
}
