// logs.rs
use tracing::Level;
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};
use tvbconfig::Config;

/// Installs the global subscriber.
///
/// The level comes from `host.logger.min_level` unless `override_level`
/// is given; the console layer follows `host.logger.enable_console`.
pub fn init_logging(config: &Config, override_level: Option<&str>) {
    let configured = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string());
    let log_level = override_level
        .and_then(string_to_level)
        .or_else(|| string_to_level(&configured))
        .map(level_to_levelfilter)
        .unwrap_or(LevelFilter::INFO);

    let enable_console = config.get_log_enable_console().unwrap_or(true);

    let subscriber = Registry::default().with(log_level);
    if enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber.init();
    }
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" | "WARNING" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

fn level_to_levelfilter(level: Level) -> LevelFilter {
    match level {
        Level::ERROR => LevelFilter::ERROR,
        Level::WARN => LevelFilter::WARN,
        Level::INFO => LevelFilter::INFO,
        Level::DEBUG => LevelFilter::DEBUG,
        Level::TRACE => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(string_to_level("debug"), Some(Level::DEBUG));
        assert_eq!(string_to_level(" Warning "), Some(Level::WARN));
        assert_eq!(string_to_level("loud"), None);
        assert_eq!(level_to_levelfilter(Level::TRACE), LevelFilter::TRACE);
    }
}
