//! Utilities for logging.

use tracing::subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    HumanReadable,
    Json,
}

impl LogFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "human" | "human_readable" => Some(LogFormat::HumanReadable),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Install a global subscriber writing to `make_writer`.
///
/// `default_level` is used unless overridden with `RUST_LOG`. Only the first
/// call installs a subscriber, later calls are no-ops.
pub fn configure_global_logger<W>(default_level: tracing::Level, format: LogFormat, make_writer: W)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_file(true)
        .with_line_number(true)
        .with_writer(make_writer);

    let result = match format {
        LogFormat::HumanReadable => subscriber::set_global_default(builder.finish()),
        LogFormat::Json => subscriber::set_global_default(builder.json().finish()),
    };

    // Already have a global subscriber.
    let _ = result;
}

/// Logger for tests, writes through the test harness so output is captured.
pub fn init_test() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::DEBUG.into())
        .from_env_lossy();
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_test_writer()
        .with_env_filter(env_filter)
        .finish();
    let _ = subscriber::set_global_default(subscriber);
}
