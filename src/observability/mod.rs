//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Emitters, managers and backends produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters via the `metrics` facade)
//!
//! Consumers:
//!     → Whatever subscriber the host installs (stdout by default)
//!     → Whatever metrics recorder the host installs (none by default)
//! ```
//!
//! # Design Decisions
//! - The library never installs a metrics exporter; counters are no-ops
//!   until the host registers a recorder
//! - Log level comes from `RUST_LOG` first, config second

pub mod logging;
pub mod metrics;

use crate::config::schema::ObservabilityConfig;

/// Install the log subscriber and apply the metrics switch.
///
/// Returns `false` if a global subscriber was already set.
pub fn init(config: &ObservabilityConfig) -> bool {
    metrics::set_enabled(config.metrics_enabled);
    logging::init_logging(config)
}
