use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::allocator::ChallengeMode;
use crate::challenge::{ChallengeStatus, DepositStatus};

/// Every ledger transition produces one or more Events.
/// Collaborators (storage, linked ledgers, notifications) consume them;
/// the engine never acts on them itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ChallengeCreated {
        challenge_id: String,
        mode: ChallengeMode,
        target_amount: i64,
        total_weeks: u32,
        start_date: NaiveDate,
    },
    DepositRecorded {
        challenge_id: String,
        week: u32,
        amount: i64,
        status: DepositStatus,
        date: NaiveDate,
        total_deposited: i64,
    },
    /// Ask the collaborator layer to mirror a paid deposit into the
    /// linked external account.
    LinkedTransactionRequested {
        challenge_id: String,
        week: u32,
        amount: i64,
        account_ref: String,
    },
    ChallengePaused {
        challenge_id: String,
    },
    ChallengeResumed {
        challenge_id: String,
    },
    /// Every week has a paid deposit.
    ChallengeCompleted {
        challenge_id: String,
        total_deposited: i64,
    },
    ChallengeCancelled {
        challenge_id: String,
        previous: ChallengeStatus,
    },
}

impl Event {
    pub fn challenge_id(&self) -> &str {
        match self {
            Event::ChallengeCreated { challenge_id, .. }
            | Event::DepositRecorded { challenge_id, .. }
            | Event::LinkedTransactionRequested { challenge_id, .. }
            | Event::ChallengePaused { challenge_id }
            | Event::ChallengeResumed { challenge_id }
            | Event::ChallengeCompleted { challenge_id, .. }
            | Event::ChallengeCancelled { challenge_id, .. } => challenge_id,
        }
    }
}
