use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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
///
/// Output goes to stderr so command results on stdout stay machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
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
            "glossa_reload_total",
            Unit::Count,
            "Total number of translation reloads, labelled by outcome."
        );
        describe_histogram!(
            "glossa_reload_ms",
            Unit::Milliseconds,
            "Translation reload latency in milliseconds."
        );
        describe_counter!(
            "glossa_signal_ignored_total",
            Unit::Count,
            "Total number of translations-changed signals ignored because this process raised them."
        );
        describe_counter!(
            "glossa_translation_hit_total",
            Unit::Count,
            "Total number of translation lookups answered by the content provider."
        );
        describe_counter!(
            "glossa_translation_miss_total",
            Unit::Count,
            "Total number of translation lookups the content provider could not answer."
        );
        describe_counter!(
            "glossa_key_collision_total",
            Unit::Count,
            "Total number of sibling translation nodes dropped for sharing a derived key."
        );
    });
}
