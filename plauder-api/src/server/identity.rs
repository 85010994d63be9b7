use plauder_common::model::user::{ExternalId, InvalidExternalIdError, UserProfile, Username};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Identity provider replied with unexpected status: {0}")]
    UnexpectedStatus(reqwest::StatusCode),
    #[error("Identity provider reported an unusable subject: {0}")]
    Subject(#[from] InvalidExternalIdError),
}

/// Black-box seam to the third-party identity provider. `Ok(None)` means
/// the token was rejected; transport and protocol failures are errors and
/// never silently fabricate a user.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<UserProfile>, IdentityError>;
}

/// Resolves bearer tokens against an OIDC `userinfo` endpoint. One round
/// trip yields both the stable subject and the profile fields needed for
/// lazy user creation.
pub struct OidcIdentityProvider {
    http_client: reqwest::Client,
    userinfo_url: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct UserInfoClaims {
    sub: String,
    preferred_username: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl OidcIdentityProvider {
    #[must_use]
    pub fn new(userinfo_url: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            userinfo_url,
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for OidcIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Option<UserProfile>, IdentityError> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(IdentityError::UnexpectedStatus(status));
        }

        let claims: UserInfoClaims = response.json().await?;

        // A username the provider reports but we cannot represent is
        // treated as absent; the field is optional anyway.
        let username = claims
            .preferred_username
            .and_then(|username| Username::new(username).ok());

        Ok(Some(UserProfile {
            external_id: ExternalId::new(claims.sub)?,
            username,
            display_name: claims.name,
            avatar_url: claims.picture,
        }))
    }
}
