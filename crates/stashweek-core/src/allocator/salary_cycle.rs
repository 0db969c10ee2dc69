//! Template schedules built around a monthly salary cycle.
//!
//! The horizon is split into months of four weeks. Inside a month the first
//! week after payday carries the most (`Standard`) or the least (`Inverse`).
//! Across months the target ramps linearly from 85% to 115% of the average.

use super::{settle_on_last_week, Direction};
use crate::error::ChallengeError;

/// Slot weights for a front-loaded month.
pub const STANDARD_WEIGHTS: [f64; 4] = [0.40, 0.30, 0.20, 0.10];

/// Smallest weekly amount a template schedule may contain (minor units).
pub const DEFAULT_TEMPLATE_FLOOR: i64 = 5;

const WEEKS_PER_MONTH: usize = 4;
const RAMP_START: f64 = 0.85;
const RAMP_SPAN: f64 = 0.30;

pub(super) fn allocate(
    target: i64,
    total_weeks: u32,
    direction: Direction,
    floor: i64,
) -> Result<Vec<i64>, ChallengeError> {
    if floor < 0 {
        return Err(ChallengeError::InvalidScheduleParams(format!(
            "template floor must not be negative (got {floor})"
        )));
    }
    let minimum = floor
        .checked_mul(i64::from(total_weeks))
        .ok_or_else(|| ChallengeError::InvalidScheduleParams("floor overflow".into()))?;
    if target < minimum {
        return Err(ChallengeError::InvalidScheduleParams(format!(
            "target {target} cannot cover {total_weeks} weeks at a floor of {floor}"
        )));
    }

    let weeks = total_weeks as usize;
    let month_count = weeks.div_ceil(WEEKS_PER_MONTH);
    let weights = direction.month_weights();
    let monthly = monthly_targets(target, month_count);

    let mut amounts: Vec<i64> = (0..weeks)
        .map(|w| {
            let month = w / WEEKS_PER_MONTH;
            let slot = w % WEEKS_PER_MONTH;
            let weeks_in_month = (weeks - month * WEEKS_PER_MONTH).min(WEEKS_PER_MONTH);
            let share: f64 = weights[..weeks_in_month].iter().sum();
            let raw = monthly[month] * weights[slot] / share;
            (raw.round() as i64).max(floor)
        })
        .collect();

    spread_over_paydays(&mut amounts, target, month_count, floor);
    settle_on_last_week(&mut amounts, target, floor);
    Ok(amounts)
}

/// Ramped monthly targets rescaled to sum to `target`.
fn monthly_targets(target: i64, month_count: usize) -> Vec<f64> {
    let base = target as f64 / month_count as f64;
    let span = month_count.saturating_sub(1).max(1) as f64;
    let raw: Vec<f64> = (0..month_count)
        .map(|m| base * (RAMP_START + RAMP_SPAN * m as f64 / span))
        .collect();

    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return vec![0.0; month_count];
    }
    let scale = target as f64 / total;
    raw.into_iter().map(|v| v * scale).collect()
}

/// Distribute the rounding residual evenly over the first week of each month.
///
/// Reductions stop at the floor; whatever is left is settled afterwards.
fn spread_over_paydays(amounts: &mut [i64], target: i64, month_count: usize, floor: i64) {
    let diff = target - amounts.iter().sum::<i64>();
    let per_payday = (diff as f64 / month_count as f64).round() as i64;
    if per_payday == 0 {
        return;
    }
    for amount in amounts.iter_mut().step_by(WEEKS_PER_MONTH) {
        *amount += per_payday.max(floor - *amount);
    }
}
