pub mod client;
pub mod executor;
pub mod harvest;
pub mod model;
pub mod report;
pub mod traits;

// Re-export common types for convenience
pub use client::AzdoClient;
pub use executor::{Concurrency, StageExecutor};
pub use harvest::{CodeSearchPipeline, PipelineConfig, ResultStream};
pub use model::*;
pub use traits::*;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
