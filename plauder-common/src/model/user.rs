use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

pub const USERNAME_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Option<Username>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Profile fields as reported by the identity provider, keyed by the
/// provider's stable external id. This is the payload for lazy user
/// creation on first authenticated sight.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct UserProfile {
    pub external_id: ExternalId,
    pub username: Option<Username>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The username is invalid: {0}")]
pub struct InvalidUsernameError(String);

impl Username {
    pub fn new(username: String) -> Result<Self, InvalidUsernameError> {
        let length = username.chars().count();
        if (1..=USERNAME_MAX_LEN).contains(&length) {
            Ok(Username(username))
        } else {
            Err(InvalidUsernameError(username))
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

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Username"))
    }
}

/// The stable identifier the identity provider issues for a user,
/// distinct from the internal snowflake id.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct ExternalId(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The external id must not be empty")]
pub struct InvalidExternalIdError;

impl ExternalId {
    pub fn new(external_id: String) -> Result<Self, InvalidExternalIdError> {
        if external_id.is_empty() {
            Err(InvalidExternalIdError)
        } else {
            Ok(ExternalId(external_id))
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

impl<'de> Deserialize<'de> for ExternalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        ExternalId::new(inner)
            .map_err(|_| Error::invalid_value(Unexpected::Str(""), &"non-empty ExternalId"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{ExternalId, USERNAME_MAX_LEN, Username};

    #[test]
    fn username_length_bounds() {
        assert!(Username::new(String::new()).is_err());
        assert!(Username::new("a".into()).is_ok());
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN)).is_ok());
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn external_id_must_not_be_empty() {
        assert!(ExternalId::new(String::new()).is_err());
        assert_eq!(ExternalId::new("user_1".into()).unwrap().get(), "user_1");
    }
}
