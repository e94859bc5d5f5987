use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "mdpreview_render_cache_hit_total",
            Unit::Count,
            "Renders served from a session cache."
        );
        describe_counter!(
            "mdpreview_render_cache_miss_total",
            Unit::Count,
            "Renders that required a remote call."
        );
        describe_counter!(
            "mdpreview_render_remote_failure_total",
            Unit::Count,
            "Remote renders that produced no output, labelled by failure kind."
        );
        describe_counter!(
            "mdpreview_sessions_created_total",
            Unit::Count,
            "Browser sessions created."
        );
        describe_counter!(
            "mdpreview_sessions_expired_total",
            Unit::Count,
            "Idle browser sessions evicted with their render cache."
        );
    });
}
