//! Human-readable sizes and durations for UI events.

use humansize::{format_size as humanize, WINDOWS};

/// Formats a byte count with 1024-based units, e.g. `12 MB`.
pub fn format_size(bytes: u64) -> String {
    humanize(bytes, WINDOWS)
}

/// Formats a duration as `MM:SS`, or `H:MM:SS` from one hour up.
pub fn format_elapsed(millis: u64) -> String {
    let total_secs = millis / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
