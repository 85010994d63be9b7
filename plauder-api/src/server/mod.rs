use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use identity::{IdentityError, IdentityProvider};
use json::Json;
use plauder_common::model::{Id, post::PostMarker, reply::ReplyMarker};
use plauder_db::client::{DbClient, DbError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

pub mod auth;
pub mod identity;
mod json;
mod query;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub identity_provider: Arc<dyn IdentityProvider>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("Provided token was rejected by the identity provider")]
    InvalidToken,
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("No post with id {0}")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("No reply with id {0}")]
    ReplyByIdNotFound(Id<ReplyMarker>),
    #[error("You can only delete your own posts")]
    NotPostAuthor(Id<PostMarker>),
    #[error("You can only delete your own replies")]
    NotReplyAuthor(Id<ReplyMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::ReplyByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::NotPostAuthor(_) | ServerError::NotReplyAuthor(_) => {
                StatusCode::FORBIDDEN
            }
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Identity(_)
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.status() {
            StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
            StatusCode::FORBIDDEN => "FORBIDDEN",
            StatusCode::NOT_FOUND => "NOT_FOUND",
            StatusCode::BAD_REQUEST => "BAD_REQUEST",
            _ => "INTERNAL_SERVER_ERROR",
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    code: &'static str,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::ServerError;
    use axum::http::StatusCode;
    use plauder_common::model::Id;

    #[test]
    fn error_statuses_and_codes() {
        let not_found = ServerError::PostByIdNotFound(Id::from(7));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.code(), "NOT_FOUND");
        assert!(not_found.to_string().contains('7'));

        let forbidden = ServerError::NotPostAuthor(Id::from(7));
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(forbidden.code(), "FORBIDDEN");

        let unauthorized = ServerError::InvalidToken;
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unauthorized.code(), "UNAUTHORIZED");

        let unknown_route = ServerError::UnknownRoute("/nope".parse().unwrap());
        assert_eq!(unknown_route.status(), StatusCode::NOT_FOUND);
    }
}
