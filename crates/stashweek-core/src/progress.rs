//! Read-only progress metrics derived from a challenge snapshot.
//!
//! Nothing here reads the wall clock: `now` is always passed in.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::challenge::Challenge;

/// Calendar week the challenge is in, clamped to `[1, total_weeks]`.
///
/// Driven by the calendar only; payments do not move it.
pub fn current_week_number(challenge: &Challenge, now: NaiveDate) -> u32 {
    let days = (now - challenge.start_date()).num_days();
    let elapsed_weeks = days.div_euclid(7);
    let week = elapsed_weeks.saturating_add(1);
    week.clamp(1, i64::from(challenge.total_weeks())) as u32
}

/// Smallest week without a paid deposit; `None` once every week is paid.
pub fn next_unpaid_week(challenge: &Challenge) -> Option<u32> {
    (1..=challenge.total_weeks()).find(|&week| !challenge.is_week_paid(week))
}

pub fn is_complete(challenge: &Challenge) -> bool {
    next_unpaid_week(challenge).is_none()
}

/// `100 * total_deposited / target_amount`, unclamped.
///
/// Overpaying pushes the value above 100. A zero target reports 0.
pub fn progress_percent(challenge: &Challenge) -> f64 {
    if challenge.target_amount() == 0 {
        return 0.0;
    }
    100.0 * challenge.total_deposited() as f64 / challenge.target_amount() as f64
}

/// Policy for estimating when a challenge ends.
pub trait CompletionProjection {
    fn projected_completion_date(&self, challenge: &Challenge) -> NaiveDate;
}

/// `start_date + total_weeks` weeks. Pausing does not shift it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarProjection;

impl CompletionProjection for CalendarProjection {
    fn projected_completion_date(&self, challenge: &Challenge) -> NaiveDate {
        challenge
            .start_date()
            .checked_add_signed(Duration::weeks(i64::from(challenge.total_weeks())))
            .unwrap_or(NaiveDate::MAX)
    }
}

/// Snapshot handed to UI view-models and the notification scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub current_week: u32,
    pub next_unpaid_week: Option<u32>,
    pub percent: f64,
    pub projected_completion_date: NaiveDate,
    pub is_complete: bool,
    pub total_deposited: i64,
    pub remaining_amount: i64,
    /// Scheduled amount of `next_unpaid_week`.
    pub next_amount: Option<i64>,
}

/// Builds [`ProgressReport`]s with a pluggable completion projection.
#[derive(Debug, Clone, Default)]
pub struct ProgressCalculator<P = CalendarProjection> {
    projection: P,
}

impl ProgressCalculator<CalendarProjection> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: CompletionProjection> ProgressCalculator<P> {
    pub fn with_projection(projection: P) -> Self {
        Self { projection }
    }

    pub fn report(&self, challenge: &Challenge, now: NaiveDate) -> ProgressReport {
        let next_unpaid_week = next_unpaid_week(challenge);
        ProgressReport {
            current_week: current_week_number(challenge, now),
            next_unpaid_week,
            percent: progress_percent(challenge),
            projected_completion_date: self.projection.projected_completion_date(challenge),
            is_complete: next_unpaid_week.is_none(),
            total_deposited: challenge.total_deposited(),
            remaining_amount: challenge.remaining_amount(),
            next_amount: next_unpaid_week.and_then(|w| challenge.scheduled_amount(w)),
        }
    }
}

/// Progress with the default calendar-only projection.
pub fn get_progress(challenge: &Challenge, now: NaiveDate) -> ProgressReport {
    ProgressCalculator::new().report(challenge, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{AllocationParams, Direction};
    use crate::challenge::{DepositRequest, NewChallenge};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn challenge(weeks: u32, target: i64) -> Challenge {
        Challenge::create(NewChallenge {
            id: Some("p".into()),
            title: "Progress".into(),
            icon: "chart".into(),
            direction: Direction::Standard,
            total_weeks: weeks,
            target_amount: Some(target),
            params: AllocationParams::template(),
            start_date: date(2026, 1, 5),
            linked_account_ref: None,
        })
        .unwrap()
        .challenge
    }

    #[test]
    fn current_week_is_calendar_driven_and_clamped() {
        let c = challenge(8, 10_000);
        assert_eq!(current_week_number(&c, date(2025, 12, 1)), 1);
        assert_eq!(current_week_number(&c, date(2026, 1, 5)), 1);
        assert_eq!(current_week_number(&c, date(2026, 1, 11)), 1);
        assert_eq!(current_week_number(&c, date(2026, 1, 12)), 2);
        assert_eq!(current_week_number(&c, date(2026, 2, 23)), 8);
        assert_eq!(current_week_number(&c, date(2027, 1, 1)), 8);
    }

    #[test]
    fn next_unpaid_skips_paid_weeks_only() {
        let c = challenge(4, 10_000);
        assert_eq!(next_unpaid_week(&c), Some(1));
        let c = c
            .record_deposit(DepositRequest::paid(1, 10, date(2026, 1, 5)))
            .unwrap()
            .challenge;
        let c = c
            .record_deposit(
                DepositRequest::paid(2, 10, date(2026, 1, 12))
                    .with_status(crate::challenge::DepositStatus::Skipped),
            )
            .unwrap()
            .challenge;
        assert_eq!(next_unpaid_week(&c), Some(2));
        assert!(!is_complete(&c));
    }

    #[test]
    fn percent_is_not_clamped() {
        let c = challenge(4, 10_000)
            .record_deposit(DepositRequest::paid(1, 15_000, date(2026, 1, 5)))
            .unwrap()
            .challenge;
        assert!((progress_percent(&c) - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn projection_is_calendar_only_even_when_paused() {
        let c = challenge(52, 500_000);
        let paused = c.toggle_pause().unwrap().challenge;
        let expected = date(2027, 1, 4);
        assert_eq!(CalendarProjection.projected_completion_date(&c), expected);
        assert_eq!(CalendarProjection.projected_completion_date(&paused), expected);
    }

    #[test]
    fn custom_projection_can_be_plugged_in() {
        struct Fixed(NaiveDate);
        impl CompletionProjection for Fixed {
            fn projected_completion_date(&self, _: &Challenge) -> NaiveDate {
                self.0
            }
        }
        let c = challenge(4, 10_000);
        let report = ProgressCalculator::with_projection(Fixed(date(2030, 1, 1)))
            .report(&c, date(2026, 1, 5));
        assert_eq!(report.projected_completion_date, date(2030, 1, 1));
    }

    #[test]
    fn report_bundles_metrics() {
        let c = challenge(4, 10_000);
        let first = c.scheduled_amount(1).unwrap();
        let c = c
            .record_deposit(DepositRequest::paid(1, first, date(2026, 1, 5)))
            .unwrap()
            .challenge;
        let report = get_progress(&c, date(2026, 1, 14));
        assert_eq!(report.current_week, 2);
        assert_eq!(report.next_unpaid_week, Some(2));
        assert_eq!(report.next_amount, c.scheduled_amount(2));
        assert!(!report.is_complete);
        assert_eq!(report.total_deposited, first);
        assert_eq!(report.remaining_amount, 10_000 - first);
        assert_eq!(report.projected_completion_date, date(2026, 2, 2));
    }
}
