//! Schedule allocator.
//!
//! Turns a target amount and a horizon into a week-by-week deposit schedule
//! in integer minor units. Two strategies exist:
//!
//! - **Template** ("salary cycle method"): months of four weeks, each month
//!   weighted toward the presumed payday and ramped from ~85% to ~115% of the
//!   average month.
//! - **Custom**: a literal arithmetic progression between two endpoints.
//!
//! Both strategies finish with a residual pass so the schedule always sums to
//! the target exactly. The allocator is pure and runs once per challenge.

mod catalog;
mod progression;
mod salary_cycle;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ChallengeError;

pub use catalog::{find_template, ChallengeTemplate, TEMPLATES};
pub use salary_cycle::{DEFAULT_TEMPLATE_FLOOR, STANDARD_WEIGHTS};

/// Which end of the horizon carries the larger deposits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Front-loaded.
    #[default]
    Standard,
    /// Back-loaded.
    Inverse,
}

impl Direction {
    /// Per-month slot weights, heaviest slot first for `Standard`.
    pub fn month_weights(self) -> [f64; 4] {
        let mut weights = STANDARD_WEIGHTS;
        if self == Direction::Inverse {
            weights.reverse();
        }
        weights
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Standard => write!(f, "standard"),
            Direction::Inverse => write!(f, "inverse"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Direction::Standard),
            "inverse" => Ok(Direction::Inverse),
            other => Err(format!("unknown direction '{other}' (expected standard or inverse)")),
        }
    }
}

/// How the schedule of a challenge was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeMode {
    Template,
    Custom,
}

impl fmt::Display for ChallengeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeMode::Template => write!(f, "template"),
            ChallengeMode::Custom => write!(f, "custom"),
        }
    }
}

/// Mode-specific allocator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AllocationParams {
    /// Salary cycle method; every week is at least `floor` minor units.
    Template { floor: i64 },
    /// Arithmetic progression from `start_amount` by `step_amount` per week.
    Custom { start_amount: i64, step_amount: i64 },
}

impl AllocationParams {
    /// Template parameters with the default floor.
    pub fn template() -> Self {
        AllocationParams::Template {
            floor: DEFAULT_TEMPLATE_FLOOR,
        }
    }

    pub fn mode(&self) -> ChallengeMode {
        match self {
            AllocationParams::Template { .. } => ChallengeMode::Template,
            AllocationParams::Custom { .. } => ChallengeMode::Custom,
        }
    }
}

/// Longest supported horizon: twenty years of weeks.
pub const MAX_TOTAL_WEEKS: u32 = 1_040;

/// Largest supported target. Every amount up to 2^53 is exact as an `f64`.
pub const MAX_TARGET_AMOUNT: i64 = 1 << 53;

/// Allocate a weekly schedule.
///
/// The returned vector has exactly `total_weeks` entries (index 0 is week 1)
/// and sums to `target_amount`.
///
/// # Errors
/// Returns [`ChallengeError::InvalidScheduleParams`] when `total_weeks` is
/// zero or above [`MAX_TOTAL_WEEKS`], `target_amount` is negative or above
/// [`MAX_TARGET_AMOUNT`], a template target cannot cover the floor on every
/// week, or custom progression parameters are inconsistent.
pub fn allocate(
    target_amount: i64,
    total_weeks: u32,
    direction: Direction,
    params: &AllocationParams,
) -> Result<Vec<i64>, ChallengeError> {
    if total_weeks == 0 {
        return Err(ChallengeError::InvalidScheduleParams(
            "total_weeks must be at least 1".into(),
        ));
    }
    if total_weeks > MAX_TOTAL_WEEKS {
        return Err(ChallengeError::InvalidScheduleParams(format!(
            "total_weeks must be at most {MAX_TOTAL_WEEKS} (got {total_weeks})"
        )));
    }
    if target_amount < 0 {
        return Err(ChallengeError::InvalidScheduleParams(format!(
            "target_amount must not be negative (got {target_amount})"
        )));
    }
    if target_amount > MAX_TARGET_AMOUNT {
        return Err(ChallengeError::InvalidScheduleParams(format!(
            "target_amount must be at most {MAX_TARGET_AMOUNT} (got {target_amount})"
        )));
    }

    let amounts = match *params {
        AllocationParams::Template { floor } => {
            salary_cycle::allocate(target_amount, total_weeks, direction, floor)?
        }
        AllocationParams::Custom {
            start_amount,
            step_amount,
        } => progression::allocate(
            target_amount,
            total_weeks,
            direction,
            start_amount,
            step_amount,
        )?,
    };

    tracing::debug!(
        target_amount,
        total_weeks,
        %direction,
        mode = %params.mode(),
        first = amounts.first().copied(),
        last = amounts.last().copied(),
        "allocated schedule"
    );
    Ok(amounts)
}

/// Total a custom progression would reach, without allocating it.
///
/// # Errors
/// Returns [`ChallengeError::InvalidScheduleParams`] on zero weeks, negative
/// terms or arithmetic overflow.
pub fn progression_total(
    total_weeks: u32,
    start_amount: i64,
    step_amount: i64,
) -> Result<i64, ChallengeError> {
    progression::series_total(total_weeks, start_amount, step_amount)
}

/// Headline numbers shown before a challenge is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePreview {
    pub total_weeks: u32,
    pub first_week_amount: i64,
    pub last_week_amount: i64,
    pub target_total: i64,
}

impl SchedulePreview {
    /// Preview a custom progression from its endpoints alone.
    ///
    /// # Errors
    /// Same conditions as [`progression_total`].
    pub fn for_progression(
        total_weeks: u32,
        direction: Direction,
        start_amount: i64,
        step_amount: i64,
    ) -> Result<Self, ChallengeError> {
        let (first, last) =
            progression::endpoints(total_weeks, direction, start_amount, step_amount)?;
        Ok(Self {
            total_weeks,
            first_week_amount: first,
            last_week_amount: last,
            target_total: progression::series_total(total_weeks, start_amount, step_amount)?,
        })
    }

    /// Preview an already allocated schedule.
    ///
    /// Lengths past `u32::MAX` and totals past `i64::MAX` saturate.
    pub fn from_schedule(weekly_amounts: &[i64]) -> Self {
        Self {
            total_weeks: u32::try_from(weekly_amounts.len()).unwrap_or(u32::MAX),
            first_week_amount: weekly_amounts.first().copied().unwrap_or(0),
            last_week_amount: weekly_amounts.last().copied().unwrap_or(0),
            target_total: weekly_amounts
                .iter()
                .fold(0i64, |total, amount| total.saturating_add(*amount)),
        }
    }
}

/// Push whatever the schedule is still missing onto the last week.
///
/// A surplus is always added in full. A deficit is taken from the last week
/// first and then from the nearest earlier weeks, never below `floor`.
pub(crate) fn settle_on_last_week(amounts: &mut [i64], target: i64, floor: i64) {
    let Some(last) = amounts.len().checked_sub(1) else {
        return;
    };
    let scheduled = amounts
        .iter()
        .fold(0i64, |total, amount| total.saturating_add(*amount));
    let mut remaining = target.saturating_sub(scheduled);
    if remaining >= 0 {
        amounts[last] += remaining;
        return;
    }

    for amount in amounts.iter_mut().rev() {
        let take = (*amount - floor).min(-remaining);
        if take > 0 {
            *amount -= take;
            remaining += take;
        }
        if remaining == 0 {
            break;
        }
    }
}
