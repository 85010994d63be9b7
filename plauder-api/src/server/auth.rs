use crate::server::ServerError;
use crate::server::identity::IdentityProvider;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use plauder_common::model::{Id, user::UserMarker};
use plauder_db::client::DbClient;
use std::sync::Arc;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Request context for operations that require a signed-in caller.
///
/// Derivation resolves the bearer token at the identity provider, then
/// lazily creates the internal user on first sight. Everything runs
/// before the handler body, so an unauthorized call never reaches data
/// access.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }

    /// Acts as the given user without going through token resolution.
    #[cfg(test)]
    pub(crate) fn for_user(id: Id<UserMarker>) -> Self {
        Self { id }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    Arc<dyn IdentityProvider>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let bearer = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?;

        let identity_provider = Arc::<dyn IdentityProvider>::from_ref(state);
        let profile = identity_provider
            .resolve(bearer.token())
            .await?
            .ok_or(ServerError::InvalidToken)?;

        let db = Arc::<DbClient>::from_ref(state);
        let id = match db.find_user_by_external_id(&profile.external_id).await? {
            Some(id) => id,
            None => db.upsert_user(&profile).await?,
        };

        Ok(Self { id })
    }
}

/// Like [`AuthenticatedUser`], but a missing Authorization header means
/// anonymous instead of an error. A header that is present but rejected
/// still fails; a client that sends a token deserves to learn it is bad.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct MaybeAuthenticatedUser(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for MaybeAuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    Arc<dyn IdentityProvider>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthenticatedUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(ServerError::InvalidAuthorizationHeader(rejection)) if rejection.is_missing() => {
                Ok(Self(None))
            }
            Err(err) => Err(err),
        }
    }
}
