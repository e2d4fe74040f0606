use threadrelay_protocol::new_id;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::paths::DataPaths;

const DEFAULT_FILTER: &str = "info,tower_http=warn,hyper=warn,reqwest=warn";

pub struct LoggingHandle {
    pub run_id: String,
    pub guard: WorkerGuard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(value) if value.trim().eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Filter directive: `THREADRELAY_LOG_FILTER` > `RUST_LOG` > default.
fn filter_directive(relay: Option<String>, rust_log: Option<String>) -> String {
    relay
        .filter(|value| EnvFilter::try_new(value).is_ok())
        .or(rust_log.filter(|value| EnvFilter::try_new(value).is_ok()))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

pub fn init_logging(paths: &DataPaths) -> anyhow::Result<LoggingHandle> {
    let log_dir = paths.log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_path = paths.log_file();

    if std::env::var("THREADRELAY_TRUNCATE_LOG_ON_START").as_deref() == Ok("1") {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_path)?;
    }

    let directive = filter_directive(
        std::env::var("THREADRELAY_LOG_FILTER").ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let filter = EnvFilter::try_new(&directive)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "server.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let format = LogFormat::parse(std::env::var("THREADRELAY_LOG_FORMAT").ok().as_deref());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .pretty()
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .flatten_event(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true)
                    .with_current_span(true),
            )
            .init(),
    }

    let run_id = std::env::var("THREADRELAY_RUN_ID")
        .unwrap_or_else(|_| format!("pid-{}-{}", std::process::id(), new_id()));

    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        log_path = %log_path.display(),
        format = ?format,
        filter = %directive,
        run_id = %run_id,
    );

    Ok(LoggingHandle { run_id, guard })
}
