use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub fn tracing_log_path() -> PathBuf {
    env::var("VOXCALL_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("voxcall_trace.jsonl"))
}

/// Level the stderr logger runs at for this configuration.
pub fn log_level(config: &AppConfig) -> Level {
    if config.debug_vad {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Install the global subscriber once.
///
/// `--logs` appends JSON lines to [`tracing_log_path`]; otherwise human-readable
/// logs go to stderr so stdout stays clean for reports. `--no-logs` wins over both.
pub fn init_tracing(config: &AppConfig) {
    if config.no_logs {
        return;
    }
    let level = log_level(config);

    let _ = TRACING_INIT.get_or_init(|| {
        if config.logs {
            let path = tracing_log_path();
            let file = match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => file,
                Err(err) => {
                    eprintln!("voxcall: cannot open trace log {}: {err}", path.display());
                    return;
                }
            };
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_max_level(level)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(file)
                .with_current_span(false)
                .with_span_list(false)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        } else {
            let subscriber = tracing_subscriber::fmt()
                .compact()
                .with_max_level(level)
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    });
}
