//! Custom schedules: an arithmetic progression between two endpoints.

use super::{settle_on_last_week, Direction};
use crate::error::ChallengeError;

fn overflow() -> ChallengeError {
    ChallengeError::InvalidScheduleParams("progression overflows the amount range".into())
}

/// First and last scheduled amounts for the given direction.
pub(super) fn endpoints(
    total_weeks: u32,
    direction: Direction,
    start_amount: i64,
    step_amount: i64,
) -> Result<(i64, i64), ChallengeError> {
    if total_weeks == 0 {
        return Err(ChallengeError::InvalidScheduleParams(
            "total_weeks must be at least 1".into(),
        ));
    }
    let far = step_amount
        .checked_mul(i64::from(total_weeks - 1))
        .and_then(|span| start_amount.checked_add(span))
        .ok_or_else(overflow)?;
    if start_amount < 0 || far < 0 {
        return Err(ChallengeError::InvalidScheduleParams(format!(
            "progression from {start_amount} by {step_amount} reaches a negative week"
        )));
    }
    Ok(match direction {
        Direction::Standard => (start_amount, far),
        Direction::Inverse => (far, start_amount),
    })
}

/// `W * (start + last) / 2`, computed without fractions.
pub(super) fn series_total(
    total_weeks: u32,
    start_amount: i64,
    step_amount: i64,
) -> Result<i64, ChallengeError> {
    endpoints(total_weeks, Direction::Standard, start_amount, step_amount)?;
    let weeks = i64::from(total_weeks);
    let pairs = weeks.checked_mul(weeks - 1).ok_or_else(overflow)? / 2;
    weeks
        .checked_mul(start_amount)
        .zip(step_amount.checked_mul(pairs))
        .and_then(|(base, ramp)| base.checked_add(ramp))
        .ok_or_else(overflow)
}

pub(super) fn allocate(
    target: i64,
    total_weeks: u32,
    direction: Direction,
    start_amount: i64,
    step_amount: i64,
) -> Result<Vec<i64>, ChallengeError> {
    let (first, last) = endpoints(total_weeks, direction, start_amount, step_amount)?;
    let expected = series_total(total_weeks, start_amount, step_amount)?;
    if target != expected {
        return Err(ChallengeError::InvalidScheduleParams(format!(
            "target {target} does not match the progression total {expected}"
        )));
    }

    let weeks = total_weeks as usize;
    let mut amounts: Vec<i64> = if weeks == 1 {
        vec![first]
    } else {
        let span = (last - first) as f64;
        let steps = (weeks - 1) as f64;
        (0..weeks)
            .map(|w| (first as f64 + span * w as f64 / steps).round() as i64)
            .collect()
    };

    settle_on_last_week(&mut amounts, target, 0);
    Ok(amounts)
}
