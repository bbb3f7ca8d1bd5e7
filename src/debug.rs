use log::LevelFilter;
use std::sync::atomic::{AtomicU8, Ordering};

static DEBUG_LEVEL: AtomicU8 = AtomicU8::new(0);

pub fn level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Start the `env_logger` backend. Each `-v` raises the level one step from
/// `warn`; `RUST_LOG`, when set, wins.
pub fn init_logging(verbosity: u8) {
    DEBUG_LEVEL.store(verbosity.min(3), Ordering::SeqCst);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level_filter(verbosity));
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let _ = builder.try_init();
}

pub fn get_debug_level() -> u8 {
    DEBUG_LEVEL.load(Ordering::SeqCst)
}

pub fn is_debug_enabled() -> bool {
    get_debug_level() > 1
}
