use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. Filter comes from `MARKSYNC_LOG`, then
/// `RUST_LOG`, else `info`. Safe to call more than once.
pub fn init() {
    let filter = std::env::var("MARKSYNC_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    // a subscriber already installed (host app, earlier call) wins
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}
