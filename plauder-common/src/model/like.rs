use serde::{Deserialize, Serialize};

/// The caller's like state on one post, as returned by the toggle and
/// lookup endpoints.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
pub struct LikeState {
    pub liked: bool,
}
