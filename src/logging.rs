use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "TGS_LOG";
const DEFAULT_FILTER: &str = "info";

/// Installs the global fmt subscriber. Filter comes from `TGS_LOG`, e.g.
/// `TGS_LOG=tgs_agent=debug`. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init();
}
