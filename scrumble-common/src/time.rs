//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Countdown text for a voting window ending at `ends_at`
///
/// `"ENDED"` once the end has passed, `"{d}d {h}h"` while at least a day
/// remains, otherwise `"{h}h"`.
pub fn time_remaining(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = ends_at - now;
    if diff <= chrono::Duration::zero() {
        return "ENDED".to_string();
    }

    let days = diff.num_days();
    let hours = diff.num_hours() % 24;
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else {
        format!("{}h", hours)
    }
}
