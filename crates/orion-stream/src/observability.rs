use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::config::parse_bool_env;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "orion-stream.logs.jsonl";

/// Logging settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilitySettings {
    pub enabled: bool,
    /// Explicit filter directive; `None` defers to `RUST_LOG`, then `info`.
    pub level: Option<String>,
    pub json_log_path: Option<PathBuf>,
}

impl ObservabilitySettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = ["ORION_OBSERVABILITY_ENABLED", "ORION_OBSERVABILITY"]
            .into_iter()
            .find_map(|key| lookup(key))
            .map_or(true, |value| parse_bool_env(&value).unwrap_or(true));
        Self {
            enabled,
            level: lookup("ORION_LOG_LEVEL").filter(|v| !v.trim().is_empty()),
            json_log_path: lookup("ORION_JSON_LOG_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        if let Some(level) = &self.level
            && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
        {
            return filter;
        }
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    }
}

/// Initialize tracing once per process.
///
/// Environment variables:
/// - `ORION_OBSERVABILITY_ENABLED` / `ORION_OBSERVABILITY`: enable flag (default enabled).
/// - `ORION_LOG_LEVEL`: filter override (`info`, `orion_stream=debug`, ...).
/// - `ORION_JSON_LOG_PATH`: when set, logs are written as JSONL to that file.
///   Otherwise a compact console format goes to stderr so stdout stays free
///   for rendered output.
/// - `RUST_LOG`: fallback filter.
pub fn init_observability() {
    INIT.get_or_init(|| install(ObservabilitySettings::from_env()));
}

fn install(settings: ObservabilitySettings) {
    if !settings.enabled {
        return;
    }
    let env_filter = settings.env_filter();
    match &settings.json_log_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                let _ = std::fs::create_dir_all(parent);
            }
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(DEFAULT_LOG_FILE);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        }
        None => {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    }
}
