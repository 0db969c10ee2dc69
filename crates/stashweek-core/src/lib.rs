//! # Stashweek Core Library
//!
//! Core business logic for weekly savings challenges. A challenge turns a
//! target amount and a horizon into a week-by-week deposit schedule, then
//! tracks which weeks have been paid until the goal is reached.
//!
//! ## Architecture
//!
//! - **Allocator**: pure schedule generation (salary cycle templates and
//!   custom arithmetic progressions), exact to the minor unit
//! - **Challenge**: the aggregate holding configuration, schedule and ledger,
//!   with a status state machine driven by ledger operations
//! - **Progress**: read-only metrics computed from a snapshot and an injected `now`
//! - **Storage**: SQLite persistence with optimistic versioning, TOML configuration
//!
//! ## Key Components
//!
//! - [`allocate`]: schedule allocator
//! - [`Challenge`]: aggregate root and ledger mutator
//! - [`ProgressCalculator`]: progress reports
//! - [`ChallengeDb`]: challenge persistence
//! - [`Config`]: application configuration management

pub mod allocator;
pub mod challenge;
pub mod error;
pub mod events;
pub mod progress;
pub mod storage;

pub use allocator::{
    allocate, find_template, AllocationParams, ChallengeMode, ChallengeTemplate, Direction,
    SchedulePreview, MAX_TARGET_AMOUNT, MAX_TOTAL_WEEKS, TEMPLATES,
};
pub use challenge::{
    recompute_totals, Challenge, ChallengeStatus, Deposit, DepositRequest, DepositStatus,
    NewChallenge, Transition,
};
pub use error::{ChallengeError, ConfigError, CoreError, StoreError};
pub use events::Event;
pub use progress::{
    get_progress, CalendarProjection, CompletionProjection, ProgressCalculator, ProgressReport,
};
pub use storage::{ChallengeDb, Config};
