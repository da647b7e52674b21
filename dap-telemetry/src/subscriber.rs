use dap_config::Environment;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::io::{Error, Write};
use std::panic::PanicHookInfo;
use std::sync::{Once, OnceLock};
use thiserror::Error;
use tracing::field::display;
use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, InitError};
use tracing_log::{LogTracer, log_tracer::SetLoggerError};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber, Registry, fmt, layer::SubscriberExt};

/// JSON field carrying the replicated namespace in every production log line.
const NAMESPACE_KEY_IN_LOG: &str = "namespace";

/// Directory production log files are written to.
const LOG_DIR: &str = "logs";

/// Number of daily log files kept on disk.
const MAX_LOG_FILES: usize = 7;

/// Errors that can occur while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to build rolling file appender: {0}")]
    InitAppender(#[from] InitError),

    #[error("failed to init log tracer: {0}")]
    InitLogTracer(#[from] SetLoggerError),

    #[error("failed to set global default subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),

    #[error("an io error occurred: {0}")]
    Io(#[from] Error),
}

/// Keeps buffered log lines alive until the process exits.
///
/// Hold on to the value returned by [`init_tracing`] for the whole lifetime of
/// `main`, dropping it flushes pending file writes.
#[must_use]
pub enum LogFlusher {
    Flusher(WorkerGuard),
    NullFlusher,
}

static INIT_TEST_TRACING: Once = Once::new();

/// Enables terminal tracing in tests when `ENABLE_TRACING` is set:
///
/// ```bash
/// ENABLE_TRACING=1 cargo test test_name
/// ```
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_ok() {
            // Without an explicit environment we would default to prod and log to files.
            Environment::Dev.set();
            let _log_flusher =
                init_tracing("test").expect("Failed to initialize tracing for tests");
        }
    });
}

static NAMESPACE: OnceLock<String> = OnceLock::new();

/// Sets the namespace injected into every JSON log line.
pub fn set_global_namespace(namespace: String) {
    let _ = NAMESPACE.set(namespace);
}

/// Returns the namespace set with [`set_global_namespace`], if any.
pub fn get_global_namespace() -> Option<&'static str> {
    NAMESPACE.get().map(|s| s.as_str())
}

/// Writer adding the global namespace to JSON log lines that do not carry one.
struct NamespaceInjectingWriter<W> {
    inner: W,
}

impl<W> NamespaceInjectingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W> Write for NamespaceInjectingWriter<W>
where
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(output) = inject_namespace(buf) {
            self.inner.write_all(output.as_bytes())?;
            return Ok(buf.len());
        }

        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Returns the log line with the namespace added, or `None` when it should be written unchanged.
fn inject_namespace(buf: &[u8]) -> Option<String> {
    let namespace = get_global_namespace()?;
    let line = std::str::from_utf8(buf).ok()?;

    let serde_json::Value::Object(mut map) = serde_json::from_str(line).ok()? else {
        return None;
    };
    if map.contains_key(NAMESPACE_KEY_IN_LOG) {
        return None;
    }

    map.insert(
        NAMESPACE_KEY_IN_LOG.to_owned(),
        serde_json::Value::String(namespace.to_owned()),
    );
    let modified = serde_json::to_string(&map).ok()?;

    if line.ends_with('\n') {
        Some(format!("{modified}\n"))
    } else {
        Some(modified)
    }
}

/// Initializes tracing for the application.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    init_tracing_with_namespace(app_name, None)
}

/// Initializes tracing, tagging every production log line with `namespace` when given.
pub fn init_tracing_with_namespace(
    app_name: &str,
    namespace: Option<String>,
) -> Result<LogFlusher, TracingError> {
    if let Some(namespace) = namespace {
        set_global_namespace(namespace);
    }

    // Routes records emitted through the `log` crate into `tracing`.
    LogTracer::init()?;

    let is_prod = Environment::load()?.is_prod();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_flusher = if is_prod {
        configure_prod_tracing(filter, app_name)?
    } else {
        configure_dev_tracing(filter)?
    };

    set_tracing_panic_hook();

    Ok(log_flusher)
}

/// JSON lines written to daily rotated files through a non-blocking appender.
fn configure_prod_tracing(filter: EnvFilter, app_name: &str) -> Result<LogFlusher, TracingError> {
    let file_appender = rolling::Builder::new()
        .filename_prefix(app_name)
        .filename_suffix("log")
        .rotation(rolling::Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .build(LOG_DIR)?;

    let (file_appender, guard) = tracing_appender::non_blocking(file_appender);

    let format = fmt::format()
        .with_level(true)
        .with_ansi(false)
        .with_target(false);

    let subscriber = Registry::default().with(filter).with(
        fmt::layer()
            .event_format(format)
            .with_writer(move || NamespaceInjectingWriter::new(file_appender.make_writer()))
            .json()
            .with_current_span(true)
            .with_span_list(true),
    );

    set_global_default(subscriber)?;

    Ok(LogFlusher::Flusher(guard))
}

/// Pretty, colored terminal output.
fn configure_dev_tracing(filter: EnvFilter) -> Result<LogFlusher, TracingError> {
    let format = fmt::format()
        .with_level(true)
        .with_ansi(true)
        .pretty()
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let subscriber = FmtSubscriber::builder()
        .event_format(format)
        .with_env_filter(filter)
        .finish();

    set_global_default(subscriber)?;

    Ok(LogFlusher::NullFlusher)
}

/// Chains a hook logging panics through `tracing` in front of the default one.
fn set_tracing_panic_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        panic_hook(info);
        prev_hook(info);
    }));
}

fn panic_hook(panic_info: &PanicHookInfo) {
    let backtrace = Backtrace::capture();
    let (backtrace, note) = match backtrace.status() {
        BacktraceStatus::Captured => (Some(backtrace), None),
        BacktraceStatus::Disabled => (
            None,
            Some("run with RUST_BACKTRACE=1 to display backtraces"),
        ),
        BacktraceStatus::Unsupported => {
            (None, Some("backtraces are not supported on this platform"))
        }
        _ => (None, Some("backtrace status is unknown")),
    };

    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    };

    let location = panic_info.location().map(|location| location.to_string());

    tracing::error!(
        panic.payload = payload,
        payload.location = location,
        panic.backtrace = backtrace.map(display),
        panic.note = note,
        "a panic occurred",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_is_added_to_json_lines_only() {
        set_global_namespace("canvas".to_owned());

        let line = b"{\"level\":\"INFO\",\"message\":\"table resolved\"}\n";
        let injected = inject_namespace(line).unwrap();
        let value: serde_json::Value = serde_json::from_str(injected.trim_end()).unwrap();
        assert_eq!(value["namespace"], "canvas");
        assert!(injected.ends_with('\n'));

        assert!(inject_namespace(b"plain text line").is_none());
        assert!(inject_namespace(b"{\"namespace\":\"other\"}").is_none());
    }
}
