use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Crates whose events come from the per-connection reader and scheduler
/// threads. They only emit `debug` and `trace`, one or more per byte at
/// `trace`.
const LIBRARY_TARGETS: [&str; 3] = ["bufconn_conn", "bufconn_transport", "bufconn_frame"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Level for the library crates. Byte-level `trace` output is only
    /// enabled by an explicit `--log-level trace`; `debug` shows connection
    /// lifecycle events.
    pub fn library_filter(self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            _ => LevelFilter::WARN,
        }
    }

    fn targets(self) -> Targets {
        LIBRARY_TARGETS
            .iter()
            .fold(Targets::new().with_default(self.as_filter()), |targets, name| {
                targets.with_target(*name, self.library_filter())
            })
    }
}

/// Install the stderr subscriber.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(false);

    let registry = tracing_subscriber::registry().with(level.targets());
    match format {
        LogFormat::Text => {
            let _ = registry.with(layer).try_init();
        }
        LogFormat::Json => {
            let _ = registry.with(layer.json()).try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn info_keeps_library_threads_quiet() {
        let targets = LogLevel::Info.targets();
        assert!(targets.would_enable("bufconn", &Level::INFO));
        assert!(!targets.would_enable("bufconn_conn::scheduler", &Level::DEBUG));
        assert!(targets.would_enable("bufconn_conn::reader", &Level::WARN));
    }

    #[test]
    fn trace_enables_byte_level_events() {
        let targets = LogLevel::Trace.targets();
        assert!(targets.would_enable("bufconn_conn::reader", &Level::TRACE));
        assert!(targets.would_enable("bufconn_transport::stream", &Level::TRACE));
    }

    #[test]
    fn error_level_still_silences_the_cli() {
        let targets = LogLevel::Error.targets();
        assert!(!targets.would_enable("bufconn", &Level::WARN));
        assert!(targets.would_enable("bufconn_conn", &Level::WARN));
    }
}
