//! Duration-string parsing for duration thresholds.

use std::time::Duration;

/// Parse a human-readable duration string into a [`Duration`].
///
/// Supports components: `Xd` (days), `Xh` (hours), `Xm` (minutes), `Xs`
/// (seconds). Components can be combined: "2h30m", "1d12h", "90s". A bare
/// trailing number counts as seconds. Returns `None` if the string is empty
/// or unparseable.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total_secs: u64 = 0;
    let mut num_buf = String::new();

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
        } else {
            let n: u64 = num_buf.parse().ok()?;
            num_buf.clear();
            match ch {
                'd' => total_secs += n * 86_400,
                'h' => total_secs += n * 3_600,
                'm' => total_secs += n * 60,
                's' => total_secs += n,
                _ => return None,
            }
        }
    }

    if !num_buf.is_empty() {
        total_secs += num_buf.parse::<u64>().ok()?;
    }

    Some(Duration::from_secs(total_secs))
}
