use chrono::{Duration, NaiveDateTime, NaiveTime};

/// Twice-daily refresh schedule. A refresh is due inside a window of
/// `window_minutes` centered on each scheduled time, so a run that
/// starts a little early or late still counts for that slot.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    pub times: Vec<NaiveTime>,
    pub window_minutes: i64,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            times: vec![
                NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            ],
            window_minutes: 60,
        }
    }
}

impl RefreshPolicy {
    /// Whether `at` falls inside any scheduled window. Windows that
    /// cross midnight are checked on both sides.
    pub fn is_within_window(&self, at: NaiveDateTime) -> bool {
        let half = Duration::minutes(self.window_minutes / 2);
        for &time in &self.times {
            for day_offset in [-1i64, 0, 1] {
                let center = (at.date() + Duration::days(day_offset)).and_time(time);
                if at >= center - half && at <= center + half {
                    return true;
                }
            }
        }
        false
    }

    /// The next scheduled refresh strictly after `from`.
    pub fn next_refresh(&self, from: NaiveDateTime) -> NaiveDateTime {
        let mut candidates: Vec<NaiveDateTime> = Vec::new();
        for day_offset in [0i64, 1] {
            let date = from.date() + Duration::days(day_offset);
            for &time in &self.times {
                candidates.push(date.and_time(time));
            }
        }
        candidates.sort();
        candidates
            .into_iter()
            .find(|&candidate| candidate > from)
            // With at least one scheduled time, tomorrow always has a
            // candidate after `from`.
            .unwrap_or_else(|| (from.date() + Duration::days(1)).and_time(NaiveTime::MIN))
    }
}
