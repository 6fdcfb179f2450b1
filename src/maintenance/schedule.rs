//! # Scheduled backend blackouts.
//!
//! [`MaintenanceSchedule`] holds one weekday reset window per region (in that
//! region's timezone) and one weekend blackout shared by all regions (in the
//! Americas exchange timezone). Both edges of every window are widened by
//! `margin`.
//!
//! ## Check order
//! ```text
//! is_within_scheduled_blackout(now, region)
//!   ├─► weekend window (minute-of-week, New York)  ── true ──► true
//!   └─► regional daily window (minute-of-day, region tz)
//! ```

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

use super::region::ServerRegion;

const MINUTES_PER_DAY: u32 = 24 * 60;
const MINUTES_PER_WEEK: u32 = 7 * MINUTES_PER_DAY;

/// Minute of day for `h:m`.
pub const fn hm(h: u32, m: u32) -> u32 {
    h * 60 + m
}

/// Minute of week (Monday 00:00 = 0) for `day` days after Monday at `h:m`.
pub const fn dhm(day: u32, h: u32, m: u32) -> u32 {
    day * MINUTES_PER_DAY + hm(h, m)
}

/// Window repeating every day, `[start, end)` in minutes of day; may wrap midnight.
#[derive(Debug, Clone, Copy)]
pub struct DailyWindow {
    pub tz: Tz,
    pub start: u32,
    pub end: u32,
}

/// Window repeating every week, `[start, end)` in minutes of week; may wrap Sunday.
#[derive(Debug, Clone, Copy)]
pub struct WeeklyWindow {
    pub tz: Tz,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone)]
pub struct MaintenanceSchedule {
    pub weekend: WeeklyWindow,
    pub regional: HashMap<ServerRegion, DailyWindow>,
    pub margin: Duration,
}

impl Default for MaintenanceSchedule {
    /// Backend reset schedule:
    ///
    /// - weekend: Friday 23:00 → Sunday 02:00, America/New_York
    /// - America: 23:45 → 00:45, America/New_York
    /// - Europe: 05:45 → 06:45, Europe/Zurich
    /// - Asia: 20:15 → 21:15, Asia/Hong_Kong
    /// - margin: 15 minutes on both edges
    fn default() -> Self {
        let regional = HashMap::from([
            (
                ServerRegion::America,
                DailyWindow {
                    tz: chrono_tz::America::New_York,
                    start: hm(23, 45),
                    end: hm(0, 45),
                },
            ),
            (
                ServerRegion::Europe,
                DailyWindow {
                    tz: chrono_tz::Europe::Zurich,
                    start: hm(5, 45),
                    end: hm(6, 45),
                },
            ),
            (
                ServerRegion::Asia,
                DailyWindow {
                    tz: chrono_tz::Asia::Hong_Kong,
                    start: hm(20, 15),
                    end: hm(21, 15),
                },
            ),
        ]);
        Self {
            weekend: WeeklyWindow {
                tz: chrono_tz::America::New_York,
                start: dhm(4, 23, 0),
                end: dhm(6, 2, 0),
            },
            regional,
            margin: Duration::from_secs(15 * 60),
        }
    }
}

impl MaintenanceSchedule {
    /// True while the backend of `region` is expected to be down.
    pub fn is_within_scheduled_blackout(&self, now: DateTime<Utc>, region: ServerRegion) -> bool {
        if self.is_weekend_blackout(now) {
            return true;
        }
        self.regional
            .get(&region)
            .is_some_and(|w| self.is_in_daily(now, w))
    }

    pub fn is_weekend_blackout(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.weekend.tz);
        let minute = dhm(
            local.weekday().num_days_from_monday(),
            local.hour(),
            local.minute(),
        );
        within(minute, self.weekend.start, self.weekend.end, self.margin_minutes(), MINUTES_PER_WEEK)
    }

    fn is_in_daily(&self, now: DateTime<Utc>, w: &DailyWindow) -> bool {
        let local = now.with_timezone(&w.tz);
        let minute = hm(local.hour(), local.minute());
        within(minute, w.start, w.end, self.margin_minutes(), MINUTES_PER_DAY)
    }

    fn margin_minutes(&self) -> u32 {
        u32::try_from(self.margin.as_secs() / 60).unwrap_or(u32::MAX)
    }
}

/// `minute ∈ [start − margin, end + margin)` on a circle of `period` minutes.
fn within(minute: u32, start: u32, end: u32, margin: u32, period: u32) -> bool {
    let span = (end + period - start) % period;
    if span + 2 * margin.min(period) >= period {
        return true;
    }
    let lo = (start + period - margin % period) % period;
    let hi = (end + margin) % period;
    if lo <= hi {
        (lo..hi).contains(&minute)
    } else {
        minute >= lo || minute < hi
    }
}
