//! Logger initialization.

use std::io::Write;

use log::LevelFilter;

/// Install an `env_logger` writing `[HH:MM:SS] LEVEL target: message` to stderr.
///
/// `RUST_LOG` is read first; `level` then overrides the crate's own filter.
/// Safe to call more than once: later calls return the `SetLoggerError`.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();

    let quiet = dependency_level(level);
    builder.filter_level(level);
    builder.filter_module("hyper", quiet);
    builder.filter_module("ureq", quiet);
    builder.filter_module("tower_http", quiet);
    builder.filter_module("undersea_trace", level);

    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] {:<5} {}: {}",
            chrono::Utc::now().format("%H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    builder.try_init()
}

/// Level for chatty HTTP dependencies: never above `info`, never above `level`.
fn dependency_level(level: LevelFilter) -> LevelFilter {
    level.min(LevelFilter::Info)
}
