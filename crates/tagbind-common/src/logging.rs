//! Logging bootstrap
//!
//! Library code only emits `tracing` events. Hosts call [`init_logging`]
//! once at startup to get them printed.

use std::str::FromStr;

use tracing::Level;

/// Parse a level name ("debug", "INFO", ...), falling back to `INFO`
pub fn parse_level(name: &str) -> Level {
    Level::from_str(name.trim()).unwrap_or(Level::INFO)
}

/// Install a fmt subscriber at the given level
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(level: Level) -> bool {
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(%level, "Logging initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level(" WARN "), Level::WARN);
        assert_eq!(parse_level("chatty"), Level::INFO);
    }

    #[test]
    fn test_second_init_is_noop() {
        let _ = init_logging(Level::INFO);
        assert!(!init_logging(Level::DEBUG));
    }
}
