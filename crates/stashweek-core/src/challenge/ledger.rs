//! Ledger mutator.
//!
//! Every operation takes the current aggregate by reference and returns a
//! [`Transition`] holding the next aggregate and the emitted events. On error
//! nothing changes. Totals are always recomputed from the full ledger.

use chrono::NaiveDate;

use super::{Challenge, ChallengeStatus, Deposit, DepositStatus, Transition};
use crate::error::ChallengeError;
use crate::events::Event;

/// Arguments for [`Challenge::record_deposit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRequest {
    pub week: u32,
    pub amount: i64,
    pub status: DepositStatus,
    pub date: NaiveDate,
    /// Request a mirrored transaction in the linked account, if any.
    pub link_transaction: bool,
}

impl DepositRequest {
    pub fn paid(week: u32, amount: i64, date: NaiveDate) -> Self {
        Self {
            week,
            amount,
            status: DepositStatus::Paid,
            date,
            link_transaction: false,
        }
    }

    pub fn with_status(mut self, status: DepositStatus) -> Self {
        self.status = status;
        self
    }

    pub fn linked(mut self) -> Self {
        self.link_transaction = true;
        self
    }
}

/// Sum of `amount` over every `paid` ledger entry, `None` on overflow.
pub fn recompute_totals(challenge: &Challenge) -> Option<i64> {
    challenge
        .ledger
        .values()
        .filter(|d| d.status == DepositStatus::Paid)
        .try_fold(0i64, |total, d| total.checked_add(d.amount))
}

impl Challenge {
    fn ensure_open(&self) -> Result<(), ChallengeError> {
        if self.status.is_terminal() {
            tracing::warn!(id = %self.id, status = %self.status, "mutation on closed challenge");
            return Err(ChallengeError::ChallengeClosed {
                status: self.status,
            });
        }
        Ok(())
    }

    /// Copy of `self` moved to `next`, with the version bumped.
    fn advanced(&self, next: ChallengeStatus) -> Result<Challenge, ChallengeError> {
        if next != self.status && !self.status.can_transition_to(&next) {
            return Err(ChallengeError::ChallengeClosed {
                status: self.status,
            });
        }
        let mut challenge = self.clone();
        challenge.status = next;
        challenge.version = self.version.saturating_add(1);
        Ok(challenge)
    }

    /// Record (or replace) the ledger entry of one week.
    ///
    /// A `paid` entry is final: recording the same week again returns
    /// [`ChallengeError::DuplicateDeposit`], which callers treat as a no-op.
    /// When the last unpaid week gets paid the challenge becomes `Completed`.
    ///
    /// # Errors
    /// `ChallengeClosed`, `InvalidWeek`, `InvalidAmount` or `DuplicateDeposit`.
    pub fn record_deposit(&self, request: DepositRequest) -> Result<Transition, ChallengeError> {
        self.ensure_open()?;
        if request.week == 0 || request.week > self.total_weeks {
            return Err(ChallengeError::InvalidWeek {
                week: request.week,
                total_weeks: self.total_weeks,
            });
        }
        if request.amount < 0 {
            return Err(ChallengeError::InvalidAmount(request.amount));
        }
        if self.is_week_paid(request.week) {
            tracing::debug!(id = %self.id, week = request.week, "deposit replay ignored");
            return Err(ChallengeError::DuplicateDeposit { week: request.week });
        }

        let mut next = self.advanced(self.status)?;
        next.ledger.insert(
            request.week,
            Deposit {
                week: request.week,
                date: request.date,
                status: request.status,
                amount: request.amount,
            },
        );
        next.total_deposited = recompute_totals(&next).ok_or_else(|| {
            tracing::warn!(id = %self.id, week = request.week, "deposit total overflows");
            ChallengeError::InvalidAmount(request.amount)
        })?;

        let mut events = vec![Event::DepositRecorded {
            challenge_id: next.id.clone(),
            week: request.week,
            amount: request.amount,
            status: request.status,
            date: request.date,
            total_deposited: next.total_deposited,
        }];

        if request.link_transaction && request.status == DepositStatus::Paid {
            if let Some(account_ref) = &next.linked_account_ref {
                events.push(Event::LinkedTransactionRequested {
                    challenge_id: next.id.clone(),
                    week: request.week,
                    amount: request.amount,
                    account_ref: account_ref.clone(),
                });
            }
        }

        if crate::progress::is_complete(&next) {
            next.status = ChallengeStatus::Completed;
            events.push(Event::ChallengeCompleted {
                challenge_id: next.id.clone(),
                total_deposited: next.total_deposited,
            });
            tracing::info!(id = %next.id, total = next.total_deposited, "challenge completed");
        }

        tracing::info!(
            id = %next.id,
            week = request.week,
            amount = request.amount,
            status = %request.status,
            "deposit recorded"
        );
        Ok(Transition {
            challenge: next,
            events,
        })
    }

    /// Flip between `Active` and `Paused`.
    ///
    /// # Errors
    /// `ChallengeClosed` once the challenge is completed or cancelled.
    pub fn toggle_pause(&self) -> Result<Transition, ChallengeError> {
        self.ensure_open()?;
        let (next_status, event) = match self.status {
            ChallengeStatus::Active => (
                ChallengeStatus::Paused,
                Event::ChallengePaused {
                    challenge_id: self.id.clone(),
                },
            ),
            _ => (
                ChallengeStatus::Active,
                Event::ChallengeResumed {
                    challenge_id: self.id.clone(),
                },
            ),
        };
        let challenge = self.advanced(next_status)?;
        tracing::info!(id = %self.id, from = %self.status, to = %next_status, "pause toggled");
        Ok(Transition {
            challenge,
            events: vec![event],
        })
    }

    /// Abandon the challenge. Terminal.
    ///
    /// # Errors
    /// `ChallengeClosed` once the challenge is completed or cancelled.
    pub fn cancel(&self) -> Result<Transition, ChallengeError> {
        self.ensure_open()?;
        let challenge = self.advanced(ChallengeStatus::Cancelled)?;
        tracing::info!(id = %self.id, from = %self.status, "challenge cancelled");
        Ok(Transition {
            challenge,
            events: vec![Event::ChallengeCancelled {
                challenge_id: self.id.clone(),
                previous: self.status,
            }],
        })
    }
}
