///! Next-run date arithmetic.

use chrono::{Duration, NaiveDate};

/// Days subtracted from the minimum observed expiration so the next run
/// lands before any host lapses.
pub const SAFETY_MARGIN_DAYS: i64 = 6;

/// Date of the next renewal run: `today + (min(counts) - 6)` days.
///
/// Returns `None` when no expiration counts were collected. The result may
/// lie in the past; callers hand it to the external scheduler verbatim.
pub fn next_run_date(today: NaiveDate, counts: &[u32]) -> Option<NaiveDate> {
    let min = counts.iter().copied().min()?;
    Some(today + Duration::days(min as i64 - SAFETY_MARGIN_DAYS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_minimum_drives_the_schedule() {
        let next = next_run_date(date(2024, 1, 1), &[30, 12, 45]).unwrap();
        assert_eq!(next, date(2024, 1, 7));
    }

    #[test]
    fn test_no_counts_yields_none() {
        assert_eq!(next_run_date(date(2024, 1, 1), &[]), None);
    }

    #[test]
    fn test_result_may_lie_in_the_past() {
        // min below the margin schedules backwards; no clamping here.
        let next = next_run_date(date(2024, 1, 10), &[3]).unwrap();
        assert_eq!(next, date(2024, 1, 7));
    }

    #[test]
    fn test_month_rollover() {
        let next = next_run_date(date(2024, 1, 28), &[10]).unwrap();
        assert_eq!(next, date(2024, 2, 1));
    }
}
