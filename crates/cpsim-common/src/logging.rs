//! ---
//! cpsim_section: "01-core-functionality"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Shared primitives for the control-plane simulation harness."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "CPSIM_LOG";
const DEFAULT_FILTER: &str = "info";

/// Available log formats for harness output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Install the tracing subscriber used by harness-driven tests.
///
/// * `CPSIM_LOG` overrides the filter (e.g. `debug`, `cpsim_store=trace`).
///   When unset the standard `RUST_LOG` variable is honoured, then the
///   configured filter, finally defaulting to `info`.
/// * Output goes through the libtest writer so it is captured per test.
///
/// Calling this more than once is harmless; only the first call installs a
/// subscriber.
pub fn init_tracing(config: &LoggingConfig) {
    let fallback = config.filter.as_deref().unwrap_or(DEFAULT_FILTER);
    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid {} directive ({}); defaulting to {}",
                LOG_ENV, err, fallback
            );
            EnvFilter::new(fallback)
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
    };

    let fmt_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_test_writer()
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_test_writer()
            .boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok();
    if installed {
        debug!(format = ?config.format, "tracing initialised");
    }
}
