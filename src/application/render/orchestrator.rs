use bytes::Bytes;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::domain::types::{ModTime, SourceIdentity};

use super::{
    cache::SessionContext,
    response,
    types::{MarkdownRemote, RenderFailure, RenderOutcome},
};

/// Render `source` for the given session, consulting the session cache first.
///
/// A miss makes exactly one remote call; only a successful render is written
/// back, so a failure never replaces an earlier good entry.
pub async fn render<R>(
    session: &mut SessionContext,
    source: Bytes,
    id: &SourceIdentity,
    mod_time: ModTime,
    remote: &R,
) -> RenderOutcome
where
    R: MarkdownRemote + ?Sized,
{
    if let Some(html) = session.lookup(id, mod_time) {
        counter!("mdpreview_render_cache_hit_total").increment(1);
        debug!(
            target = "mdpreview::render",
            source = %id,
            "render cache hit"
        );
        return RenderOutcome::CachedHit {
            html: html.to_string(),
        };
    }
    counter!("mdpreview_render_cache_miss_total").increment(1);

    let raw = match remote.render_raw(source).await {
        Ok(raw) => raw,
        Err(err) => return failure(id, RenderFailure::from(err)),
    };

    let parsed = response::parse(&raw);
    if !parsed.is_ok() {
        let reason = if parsed.malformed {
            RenderFailure::MalformedResponse
        } else {
            RenderFailure::NotOk {
                status_ok: parsed.status_ok,
                rate_limit: parsed.rate_limit,
                rate_remaining: parsed.rate_remaining,
            }
        };
        return failure(id, reason);
    }

    info!(
        target = "mdpreview::render",
        source = %id,
        rate_limit = parsed.rate_limit,
        rate_remaining = parsed.rate_remaining,
        "rendered document remotely"
    );

    session.store(id.clone(), mod_time, parsed.body.clone());

    RenderOutcome::FreshRender {
        html: parsed.body,
        rate_limit: parsed.rate_limit,
        rate_remaining: parsed.rate_remaining,
    }
}

fn failure(id: &SourceIdentity, reason: RenderFailure) -> RenderOutcome {
    counter!("mdpreview_render_remote_failure_total", "kind" => reason.kind()).increment(1);
    warn!(
        target = "mdpreview::render",
        source = %id,
        kind = reason.kind(),
        error = %reason,
        "remote render failed"
    );
    RenderOutcome::RemoteFailure(reason)
}
