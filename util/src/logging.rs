use log::LevelFilter;

/// Environment variable consulted for log filters, in `env_logger` syntax.
pub const LOG_ENV: &str = "RUST_LOG";

/// Installs the process-wide logger.
///
/// Defaults to `info` when `RUST_LOG` is unset. Calling this twice is
/// harmless; the second call is ignored.
pub fn init() {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Info);
    if let Ok(filters) = std::env::var(LOG_ENV) {
        builder.parse_filters(&filters);
    }
    builder.format_timestamp_millis();

    if builder.try_init().is_err() {
        log::debug!("logger already installed");
    }
}
