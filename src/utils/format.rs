// src/utils/format.rs

/// Remaining time below which the countdown is flagged as low (5 minutes).
pub const LOW_TIME_SECONDS: u64 = 300;

/// Formats a countdown: `H:MM:SS` from one hour up, `M:SS` below.
pub fn format_countdown(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

pub fn is_low_time(seconds: u64) -> bool {
    seconds < LOW_TIME_SECONDS
}
