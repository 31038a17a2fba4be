pub mod formatter;

use crate::cli::TracingFormat;
use crate::config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt::format::JsonFields};

/// Configure and initialize logging for the application.
pub fn setup_logging(config: &Config, tracing_format: TracingFormat) {
    // chromiumoxide logs every unhandled CDP message at warn; keep it quiet
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let base_level = &config.log_level;
        EnvFilter::new(format!(
            "warn,biwenger_scraper={base_level},chromiumoxide=error"
        ))
    });

    match tracing_format {
        TracingFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .event_format(formatter::CustomPrettyFormatter)
                        .fmt_fields(formatter::compact_fields()),
                )
                .init();
        }
        TracingFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .event_format(formatter::CustomJsonFormatter)
                        .fmt_fields(JsonFields::new()),
                )
                .init();
        }
    }
}
