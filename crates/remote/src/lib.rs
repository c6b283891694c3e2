//! Remote client contract for paginated collection fetches.
//!
//! The engine never owns a wire format: a [`Remote`] hands back whatever
//! JSON records the upstream API returns, plus an opaque continuation link,
//! and the mapping step downstream decides what survives.

pub mod cancel;
pub mod cursor;
pub mod http;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cancel::{CancelToken, Cancelled};
pub use cursor::PageCursor;
pub use http::HttpRemote;

/// One page of a remote collection. `next_link` present means more pages,
/// even when `value` is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageCollection {
    #[serde(default)]
    pub value: Vec<serde_json::Value>,
    #[serde(
        default,
        rename = "nextLink",
        alias = "@odata.nextLink",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_link: Option<String>,
}

impl PageCollection {
    pub fn new(value: Vec<serde_json::Value>, next_link: Option<&str>) -> Self {
        Self {
            value,
            next_link: next_link.map(str::to_string),
        }
    }
}

/// Failure surfaced by a [`Remote`] or a [`PageCursor`].
///
/// `Cancelled` is deliberately its own variant so callers can tell a
/// cooperative stop apart from a transport failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch cancelled")]
    Cancelled,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid page payload: {0}")]
    Decode(String),
}

impl From<Cancelled> for FetchError {
    fn from(_: Cancelled) -> Self {
        FetchError::Cancelled
    }
}

/// An already-authenticated client capable of paginated GETs.
///
/// `path` is either a relative API path (first page) or a full continuation
/// link taken verbatim from a previous [`PageCollection`].
pub trait Remote: Sync {
    fn get(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<PageCollection, FetchError>> + Send;
}
