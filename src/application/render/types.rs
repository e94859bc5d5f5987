use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Transport to the remote Markdown renderer.
///
/// Implementations return the complete response as one raw blob (header
/// block, blank line, body) so the render pipeline can apply its own header
/// rules.
#[async_trait]
pub trait MarkdownRemote: Send + Sync {
    async fn render_raw(&self, source: Bytes) -> Result<Bytes, RemoteError>;
}

/// Failures raised before any response bytes are available.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("remote renderer did not answer within {0:?}")]
    Timeout(Duration),
    #[error("remote renderer request failed: {message}")]
    Transport { message: String },
}

impl RemoteError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

/// Why a render produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderFailure {
    #[error("remote response contained no header block")]
    MalformedResponse,
    #[error(
        "remote renderer rejected the request (status ok: {status_ok}, rate limit: {rate_limit}, remaining: {rate_remaining})"
    )]
    NotOk {
        status_ok: bool,
        rate_limit: u64,
        rate_remaining: u64,
    },
    #[error("remote renderer unreachable: {message}")]
    Unreachable { message: String },
}

impl RenderFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            RenderFailure::MalformedResponse => "malformed_response",
            RenderFailure::NotOk { .. } => "not_ok",
            RenderFailure::Unreachable { .. } => "unreachable",
        }
    }
}

impl From<RemoteError> for RenderFailure {
    fn from(error: RemoteError) -> Self {
        RenderFailure::Unreachable {
            message: error.to_string(),
        }
    }
}

/// Result of one render request, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Served from the session cache; no remote call was made.
    CachedHit { html: String },
    /// Rendered remotely and written back to the cache.
    FreshRender {
        html: String,
        rate_limit: u64,
        rate_remaining: u64,
    },
    /// Nothing was rendered or cached.
    RemoteFailure(RenderFailure),
}

impl RenderOutcome {
    pub fn html(&self) -> Option<&str> {
        match self {
            RenderOutcome::CachedHit { html } | RenderOutcome::FreshRender { html, .. } => {
                Some(html.as_str())
            }
            RenderOutcome::RemoteFailure(_) => None,
        }
    }
}
