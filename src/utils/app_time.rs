// src/utils/app_time.rs

use std::time::Duration;

pub type AppInstant = std::time::Instant;

pub fn now() -> AppInstant {
    std::time::Instant::now()
}

/// `true` once at least `delay` has passed since `since`, measured against `now`.
pub fn elapsed_at_least(since: AppInstant, now: AppInstant, delay: Duration) -> bool {
    now.saturating_duration_since(since) >= delay
}
