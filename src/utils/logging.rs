use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Install the global tracing subscriber.
///
/// `level` comes from the relay settings and is the default directive;
/// `RUST_LOG` directives are applied on top of it. Unparseable levels fall
/// back to `info`. Safe to call more than once; only the first call installs
/// a subscriber.
pub fn init(level: &str) {
    let level = level
        .to_lowercase()
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
