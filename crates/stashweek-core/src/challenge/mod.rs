//! Challenge aggregate.
//!
//! A `Challenge` owns its configuration, the schedule computed once at
//! creation, and the deposit ledger. It is never mutated in place: every
//! ledger operation (see [`ledger`]) returns a new aggregate inside a
//! [`Transition`], leaving the input untouched.
//!
//! ## Status transitions
//!
//! ```text
//! Active <──> Paused
//!    │  \       │  \
//!    │   \      │   └──> Cancelled
//!    │    └─────┼──────> Cancelled
//!    └──────────┴──────> Completed   (system, when every week is paid)
//! ```
//!
//! `Completed` and `Cancelled` are terminal.

pub mod ledger;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::allocator::{self, AllocationParams, ChallengeMode, ChallengeTemplate, Direction};
use crate::error::ChallengeError;
use crate::events::Event;

pub use ledger::{recompute_totals, DepositRequest};

/// Lifecycle state of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl ChallengeStatus {
    /// Check if a transition is valid.
    pub fn can_transition_to(&self, to: &ChallengeStatus) -> bool {
        self.valid_transitions().contains(to)
    }

    /// Get valid next states for this state.
    pub fn valid_transitions(&self) -> &'static [ChallengeStatus] {
        match self {
            ChallengeStatus::Active => &[
                ChallengeStatus::Paused,
                ChallengeStatus::Completed,
                ChallengeStatus::Cancelled,
            ],
            ChallengeStatus::Paused => &[
                ChallengeStatus::Active,
                ChallengeStatus::Completed,
                ChallengeStatus::Cancelled,
            ],
            ChallengeStatus::Completed | ChallengeStatus::Cancelled => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Paused => "paused",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ChallengeStatus::Active),
            "paused" => Ok(ChallengeStatus::Paused),
            "completed" => Ok(ChallengeStatus::Completed),
            "cancelled" => Ok(ChallengeStatus::Cancelled),
            other => Err(format!("unknown challenge status '{other}'")),
        }
    }
}

/// Status of a single ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    #[default]
    Paid,
    Pending,
    Skipped,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Paid => "paid",
            DepositStatus::Pending => "pending",
            DepositStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepositStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paid" => Ok(DepositStatus::Paid),
            "pending" => Ok(DepositStatus::Pending),
            "skipped" => Ok(DepositStatus::Skipped),
            other => Err(format!("unknown deposit status '{other}'")),
        }
    }
}

/// Ledger entry for one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub week: u32,
    /// Day the deposit was recorded, not necessarily the due date.
    pub date: NaiveDate,
    pub status: DepositStatus,
    /// Minor units actually recorded; may differ from the schedule.
    pub amount: i64,
}

/// Input for [`Challenge::create`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChallenge {
    pub id: Option<String>,
    pub title: String,
    pub icon: String,
    pub direction: Direction,
    pub total_weeks: u32,
    /// Required for template mode; derived for custom mode.
    pub target_amount: Option<i64>,
    pub params: AllocationParams,
    pub start_date: NaiveDate,
    pub linked_account_ref: Option<String>,
}

impl NewChallenge {
    /// Prefill from a catalog template.
    pub fn from_template(template: &ChallengeTemplate, start_date: NaiveDate) -> Self {
        Self {
            id: None,
            title: template.title.to_string(),
            icon: template.icon.to_string(),
            direction: Direction::Standard,
            total_weeks: template.total_weeks,
            target_amount: Some(template.target_amount),
            params: AllocationParams::template(),
            start_date,
            linked_account_ref: None,
        }
    }
}

/// Result of a ledger operation: the new aggregate and what happened.
#[derive(Debug, Clone)]
pub struct Transition {
    pub challenge: Challenge,
    pub events: Vec<Event>,
}

/// Savings challenge aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) icon: String,
    pub(crate) mode: ChallengeMode,
    pub(crate) direction: Direction,
    pub(crate) total_weeks: u32,
    pub(crate) target_amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) start_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) step_amount: Option<i64>,
    pub(crate) weekly_amounts: Vec<i64>,
    pub(crate) start_date: NaiveDate,
    pub(crate) status: ChallengeStatus,
    #[serde(with = "ledger_entries")]
    pub(crate) ledger: BTreeMap<u32, Deposit>,
    pub(crate) total_deposited: i64,
    #[serde(default)]
    pub(crate) linked_account_ref: Option<String>,
    /// Bumped by every transition; storage uses it for optimistic locking.
    #[serde(default)]
    pub(crate) version: u64,
}

impl Challenge {
    /// Validate the configuration, allocate the schedule and open the ledger.
    ///
    /// The returned transition carries a single [`Event::ChallengeCreated`].
    ///
    /// # Errors
    /// Returns [`ChallengeError::InvalidScheduleParams`] when the allocator
    /// rejects the parameters, or a template challenge has no target.
    pub fn create(config: NewChallenge) -> Result<Transition, ChallengeError> {
        let target_amount = match (config.params, config.target_amount) {
            (AllocationParams::Template { .. }, Some(target)) => target,
            (AllocationParams::Template { .. }, None) => {
                return Err(ChallengeError::InvalidScheduleParams(
                    "template challenges need a target amount".into(),
                ))
            }
            (
                AllocationParams::Custom {
                    start_amount,
                    step_amount,
                },
                given,
            ) => {
                let derived =
                    allocator::progression_total(config.total_weeks, start_amount, step_amount)?;
                match given {
                    Some(target) if target != derived => {
                        return Err(ChallengeError::InvalidScheduleParams(format!(
                            "target {target} does not match the progression total {derived}"
                        )))
                    }
                    _ => derived,
                }
            }
        };

        let weekly_amounts = allocator::allocate(
            target_amount,
            config.total_weeks,
            config.direction,
            &config.params,
        )?;

        let (start_amount, step_amount) = match config.params {
            AllocationParams::Custom {
                start_amount,
                step_amount,
            } => (Some(start_amount), Some(step_amount)),
            AllocationParams::Template { .. } => (None, None),
        };

        let challenge = Self {
            id: config.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: config.title,
            icon: config.icon,
            mode: config.params.mode(),
            direction: config.direction,
            total_weeks: config.total_weeks,
            target_amount,
            start_amount,
            step_amount,
            weekly_amounts,
            start_date: config.start_date,
            status: ChallengeStatus::Active,
            ledger: BTreeMap::new(),
            total_deposited: 0,
            linked_account_ref: config.linked_account_ref,
            version: 0,
        };
        tracing::info!(
            id = %challenge.id,
            mode = %challenge.mode,
            target_amount,
            total_weeks = challenge.total_weeks,
            "challenge created"
        );
        let event = Event::ChallengeCreated {
            challenge_id: challenge.id.clone(),
            mode: challenge.mode,
            target_amount,
            total_weeks: challenge.total_weeks,
            start_date: challenge.start_date,
        };
        Ok(Transition {
            challenge,
            events: vec![event],
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn mode(&self) -> ChallengeMode {
        self.mode
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn total_weeks(&self) -> u32 {
        self.total_weeks
    }

    pub fn target_amount(&self) -> i64 {
        self.target_amount
    }

    /// `(start_amount, step_amount)` for custom challenges.
    pub fn progression(&self) -> Option<(i64, i64)> {
        self.start_amount.zip(self.step_amount)
    }

    pub fn weekly_amounts(&self) -> &[i64] {
        &self.weekly_amounts
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn status(&self) -> ChallengeStatus {
        self.status
    }

    pub fn total_deposited(&self) -> i64 {
        self.total_deposited
    }

    pub fn linked_account_ref(&self) -> Option<&str> {
        self.linked_account_ref.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Ledger entries ordered by week.
    pub fn deposits(&self) -> impl Iterator<Item = &Deposit> {
        self.ledger.values()
    }

    pub fn deposit(&self, week: u32) -> Option<&Deposit> {
        self.ledger.get(&week)
    }

    pub fn is_week_paid(&self, week: u32) -> bool {
        self.deposit(week)
            .is_some_and(|d| d.status == DepositStatus::Paid)
    }

    /// Scheduled amount for a 1-based week.
    pub fn scheduled_amount(&self, week: u32) -> Option<i64> {
        let index = week.checked_sub(1)?;
        self.weekly_amounts.get(index as usize).copied()
    }

    /// Nominal due date of a 1-based week.
    pub fn due_date(&self, week: u32) -> Option<NaiveDate> {
        if week == 0 || week > self.total_weeks {
            return None;
        }
        self.start_date
            .checked_add_signed(Duration::weeks(i64::from(week - 1)))
    }

    /// What is still missing to reach the target; never negative.
    pub fn remaining_amount(&self) -> i64 {
        (self.target_amount - self.total_deposited).max(0)
    }

    pub fn paid_week_count(&self) -> usize {
        self.ledger
            .values()
            .filter(|d| d.status == DepositStatus::Paid)
            .count()
    }

    /// Verify the structural invariants of the aggregate.
    ///
    /// # Errors
    /// Returns a description of the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.total_weeks == 0 {
            return Err("total_weeks is zero".into());
        }
        if self.weekly_amounts.len() != self.total_weeks as usize {
            return Err(format!(
                "schedule has {} weeks, expected {}",
                self.weekly_amounts.len(),
                self.total_weeks
            ));
        }
        let scheduled = self
            .weekly_amounts
            .iter()
            .try_fold(0i64, |total, amount| total.checked_add(*amount))
            .ok_or("schedule total overflows")?;
        if scheduled != self.target_amount {
            return Err(format!(
                "schedule sums to {scheduled}, expected {}",
                self.target_amount
            ));
        }
        for (week, deposit) in &self.ledger {
            if *week != deposit.week {
                return Err(format!("ledger key {week} holds week {}", deposit.week));
            }
            if *week == 0 || *week > self.total_weeks {
                return Err(format!("ledger week {week} out of range"));
            }
        }
        let recomputed = recompute_totals(self).ok_or("ledger total overflows")?;
        if recomputed != self.total_deposited {
            return Err(format!(
                "total_deposited is {}, ledger sums to {recomputed}",
                self.total_deposited
            ));
        }
        Ok(())
    }
}

/// Ledger as a list of deposits on the wire, a week-keyed map in memory.
mod ledger_entries {
    use super::Deposit;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        ledger: &BTreeMap<u32, Deposit>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(ledger.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<u32, Deposit>, D::Error> {
        let entries = Vec::<Deposit>::deserialize(deserializer)?;
        let mut ledger = BTreeMap::new();
        for entry in entries {
            let week = entry.week;
            if ledger.insert(week, entry).is_some() {
                return Err(D::Error::custom(format!(
                    "duplicate ledger entry for week {week}"
                )));
            }
        }
        Ok(ledger)
    }
}
