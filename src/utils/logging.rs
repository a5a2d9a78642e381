use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging (reads RUST_LOG env var). Safe to call more than
/// once; only the first call takes effect.
pub fn init() {
    INIT.call_once(|| {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    });
}
