use crate::server::ServerError;
use axum::extract::{FromRequestParts, Query as AxumQuery};

/// Query extractor whose rejection goes through the server error surface
/// instead of axum's plain-text default.
#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(ServerError))]
pub struct Query<T>(pub T);
