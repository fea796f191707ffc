use chrono::{DateTime, Duration, Utc};

/// Rolling freshness window a load email must fall within to stay eligible
/// for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollingWindow {
    ThirtyMinutes,
    SixHours,
    TwentyFourHours,
    /// Everything received since the dispatcher's session began.
    SinceSessionStart(DateTime<Utc>),
}

impl RollingWindow {
    /// Oldest `received_at` still considered current, relative to `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            RollingWindow::ThirtyMinutes => now - Duration::minutes(30),
            RollingWindow::SixHours => now - Duration::hours(6),
            RollingWindow::TwentyFourHours => now - Duration::hours(24),
            RollingWindow::SinceSessionStart(start) => *start,
        }
    }

    /// Parse the configured window name ("30m", "6h", "24h").
    pub fn from_config(value: &str) -> Option<RollingWindow> {
        match value {
            "30m" => Some(RollingWindow::ThirtyMinutes),
            "6h" => Some(RollingWindow::SixHours),
            "24h" => Some(RollingWindow::TwentyFourHours),
            _ => None,
        }
    }
}

/// Whether a load email is still current.
///
/// A load carrying an explicit expiration is never excluded by staleness;
/// only that expiration (enforced by the loadboard side) retires it. A load
/// without one drops out once older than the window's cutoff.
pub fn is_current(
    received_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    window: RollingWindow,
    now: DateTime<Utc>,
) -> bool {
    if expires_at.is_some() {
        return true;
    }
    received_at >= window.cutoff(now)
}
