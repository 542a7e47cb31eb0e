//! Log output setup.
//!
//! Every line carries a local wall-clock stamp with millisecond precision,
//! e.g. `[14:03:27.518]  INFO Processing row 12...`.

use std::fmt;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

/// `HH:MM:SS.mmm` local time, bracketed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockTime;

impl FormatTime for ClockTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "[{}]", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (tests, embedding) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ClockTime)
        .with_target(false)
        .try_init();
}

/// Shorten `text` to `max` characters, appending `...` when cut.
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
