//! Log output for the `shipgate` binary.
//!
//! Everything goes to stderr: stdout carries the run summary and the
//! `classify`/`version` output that CI steps capture.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `level` when set;
/// `json` switches to one JSON object per line for log shippers.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let human = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let machine = json.then(|| {
        fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(human)
        .with(machine)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_refused() {
        init_tracing(false, Level::INFO);
        assert!(!init_tracing(true, Level::DEBUG));
    }
}
