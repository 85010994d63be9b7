pub mod like;
pub mod post;
pub mod reply;
pub mod user;

use crate::{
    model::{
        post::EmptyPostTextError,
        reply::EmptyReplyTextError,
        user::{InvalidExternalIdError, InvalidUsernameError},
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    ExternalId(#[from] InvalidExternalIdError),
    #[error(transparent)]
    PostText(#[from] EmptyPostTextError),
    #[error(transparent)]
    ReplyText(#[from] EmptyReplyTextError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PlauderEpoch;
impl Epoch for PlauderEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type PlauderSnowflake = Snowflake<PlauderEpoch>;
pub type PlauderSnowflakeGenerator = SnowflakeGenerator<PlauderEpoch>;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(PlauderSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: PlauderSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> PlauderSnowflake {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<PlauderSnowflake> for Id<Marker> {
    fn from(value: PlauderSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for PlauderSnowflake {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(PlauderSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}
