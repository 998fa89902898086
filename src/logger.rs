//! Installs the process-wide log subscriber.
//!
//! Logs go to stderr so that stdout carries nothing but the fleet summary. `RUST_LOG` takes
//! precedence over the verbosity chosen on the command line.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Maps `-v`/`-q` counts to a default level. Zero of each means `info`.
pub fn default_level(verbose: u8, quiet: u8) -> LevelFilter {
    const LEVELS: [LevelFilter; 6] = [
        LevelFilter::OFF,
        LevelFilter::ERROR,
        LevelFilter::WARN,
        LevelFilter::INFO,
        LevelFilter::DEBUG,
        LevelFilter::TRACE,
    ];
    let index = (3 + i16::from(verbose) - i16::from(quiet)).clamp(0, 5);
    LEVELS[index as usize]
}

/// Installs a formatting subscriber on stderr.
///
/// Returns an error if a global subscriber was already installed.
pub fn init(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(verbose, quiet).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to install log subscriber: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_info() {
        assert_eq!(LevelFilter::INFO, default_level(0, 0));
    }

    #[test]
    fn verbosity_saturates() {
        assert_eq!(LevelFilter::DEBUG, default_level(1, 0));
        assert_eq!(LevelFilter::TRACE, default_level(9, 0));
        assert_eq!(LevelFilter::WARN, default_level(0, 1));
        assert_eq!(LevelFilter::OFF, default_level(0, 9));
        assert_eq!(LevelFilter::INFO, default_level(2, 2));
    }
}
