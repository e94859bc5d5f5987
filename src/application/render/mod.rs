//! Remote Markdown rendering with a per-session freshness cache.
//!
//! The session cache is consulted first. A miss makes one call through
//! [`MarkdownRemote`] and the raw response is parsed by hand, so status and
//! rate-limit headers follow the same rules whichever transport produced them.

mod cache;
mod orchestrator;
pub mod response;
mod types;

pub use cache::{CacheEntry, SessionContext};
pub use orchestrator::render;
pub use response::{ParsedResponse, parse as parse_response};
pub use types::{MarkdownRemote, RemoteError, RenderFailure, RenderOutcome};
