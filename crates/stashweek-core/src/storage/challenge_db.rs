//! SQLite-based storage for challenges and their deposit ledgers.
//!
//! Writes use an optimistic version check: a save only lands when the stored
//! version still matches the version the caller loaded. Concurrent writers
//! are therefore serialized, and the loser gets
//! [`StoreError::VersionConflict`] instead of a silent merge.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

use super::{data_dir, migrations};
use crate::allocator::{ChallengeMode, Direction};
use crate::challenge::{Challenge, ChallengeStatus, Deposit, DepositStatus, Transition};
use crate::error::{ChallengeError, CoreError, StoreError};

// === Helper Functions ===

fn parse_mode(mode_str: &str) -> Result<ChallengeMode, StoreError> {
    match mode_str {
        "template" => Ok(ChallengeMode::Template),
        "custom" => Ok(ChallengeMode::Custom),
        other => Err(StoreError::Corrupt(format!("unknown mode '{other}'"))),
    }
}

fn parse_date(date_str: &str) -> Result<NaiveDate, StoreError> {
    date_str
        .parse::<NaiveDate>()
        .map_err(|e| StoreError::Corrupt(format!("bad date '{date_str}': {e}")))
}

fn to_u32(value: i64, field: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} out of range: {value}")))
}

/// Raw `challenges` row before validation.
struct ChallengeRow {
    id: String,
    title: String,
    icon: String,
    mode: String,
    direction: String,
    total_weeks: i64,
    target_amount: i64,
    start_amount: Option<i64>,
    step_amount: Option<i64>,
    weekly_amounts: String,
    start_date: String,
    status: String,
    total_deposited: i64,
    linked_account_ref: Option<String>,
    version: i64,
}

/// Raw `deposits` row before validation.
struct DepositRow {
    week: i64,
    date: String,
    status: String,
    amount: i64,
}

const CHALLENGE_COLUMNS: &str = "id, title, icon, mode, direction, total_weeks, target_amount,
    start_amount, step_amount, weekly_amounts, start_date, status, total_deposited,
    linked_account_ref, version";

fn read_challenge_row(row: &rusqlite::Row) -> Result<ChallengeRow, rusqlite::Error> {
    Ok(ChallengeRow {
        id: row.get(0)?,
        title: row.get(1)?,
        icon: row.get(2)?,
        mode: row.get(3)?,
        direction: row.get(4)?,
        total_weeks: row.get(5)?,
        target_amount: row.get(6)?,
        start_amount: row.get(7)?,
        step_amount: row.get(8)?,
        weekly_amounts: row.get(9)?,
        start_date: row.get(10)?,
        status: row.get(11)?,
        total_deposited: row.get(12)?,
        linked_account_ref: row.get(13)?,
        version: row.get(14)?,
    })
}

fn build_challenge(row: ChallengeRow, deposits: Vec<DepositRow>) -> Result<Challenge, StoreError> {
    let mut ledger = BTreeMap::new();
    for d in deposits {
        let week = to_u32(d.week, "week")?;
        let deposit = Deposit {
            week,
            date: parse_date(&d.date)?,
            status: d.status.parse::<DepositStatus>().map_err(StoreError::Corrupt)?,
            amount: d.amount,
        };
        ledger.insert(week, deposit);
    }

    let challenge = Challenge {
        mode: parse_mode(&row.mode)?,
        direction: row.direction.parse::<Direction>().map_err(StoreError::Corrupt)?,
        total_weeks: to_u32(row.total_weeks, "total_weeks")?,
        target_amount: row.target_amount,
        start_amount: row.start_amount,
        step_amount: row.step_amount,
        weekly_amounts: serde_json::from_str(&row.weekly_amounts)?,
        start_date: parse_date(&row.start_date)?,
        status: row.status.parse::<ChallengeStatus>().map_err(StoreError::Corrupt)?,
        ledger,
        total_deposited: row.total_deposited,
        linked_account_ref: row.linked_account_ref,
        version: u64::try_from(row.version)
            .map_err(|_| StoreError::Corrupt(format!("negative version {}", row.version)))?,
        id: row.id,
        title: row.title,
        icon: row.icon,
    };
    challenge
        .check_invariants()
        .map_err(|e| StoreError::Corrupt(format!("challenge {}: {e}", challenge.id)))?;
    Ok(challenge)
}

fn to_version(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

/// SQLite database for challenges.
pub struct ChallengeDb {
    conn: Connection,
}

impl ChallengeDb {
    /// Open the database at `~/.config/stashweek/stashweek.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()?.join("stashweek.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        migrations::migrate(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        migrations::migrate(&db.conn)?;
        Ok(db)
    }

    /// Store a newly created challenge.
    ///
    /// # Errors
    /// Fails if a challenge with the same id already exists.
    pub fn insert(&self, challenge: &Challenge) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO challenges (
                id, title, icon, mode, direction, total_weeks, target_amount,
                start_amount, step_amount, weekly_amounts, start_date, status,
                total_deposited, linked_account_ref, version, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                challenge.id,
                challenge.title,
                challenge.icon,
                challenge.mode.to_string(),
                challenge.direction.to_string(),
                challenge.total_weeks,
                challenge.target_amount,
                challenge.start_amount,
                challenge.step_amount,
                serde_json::to_string(&challenge.weekly_amounts)?,
                challenge.start_date.to_string(),
                challenge.status.as_str(),
                challenge.total_deposited,
                challenge.linked_account_ref,
                to_version(challenge.version),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Self::write_ledger(&tx, challenge)?;
        tx.commit()?;
        tracing::debug!(id = %challenge.id, "challenge inserted");
        Ok(())
    }

    /// Get a challenge by ID.
    pub fn get(&self, id: &str) -> Result<Option<Challenge>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = ?1"),
                params![id],
                read_challenge_row,
            )
            .optional()?;
        match row {
            Some(row) => {
                let deposits = self.load_deposits(&row.id)?;
                Ok(Some(build_challenge(row, deposits)?))
            }
            None => Ok(None),
        }
    }

    /// Get a challenge by ID, failing when it does not exist.
    pub fn require(&self, id: &str) -> Result<Challenge, StoreError> {
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// All challenges ordered by start date.
    pub fn list(&self) -> Result<Vec<Challenge>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM challenges ORDER BY start_date, id"
        ))?;
        let rows = stmt
            .query_map([], read_challenge_row)?
            .collect::<Result<Vec<_>, _>>()?;
        self.hydrate(rows)
    }

    /// Challenges in one status, most recently written first.
    pub fn list_by_status(&self, status: ChallengeStatus) -> Result<Vec<Challenge>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM challenges
             WHERE status = ?1
             ORDER BY updated_at DESC, id"
        ))?;
        let rows = stmt
            .query_map(params![status.as_str()], read_challenge_row)?
            .collect::<Result<Vec<_>, _>>()?;
        self.hydrate(rows)
    }

    /// When the challenge row was last inserted or saved.
    ///
    /// Rows carried over from a v1 schema have no timestamp until their next save.
    pub fn updated_at(&self, id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let stamp: String = self
            .conn
            .query_row(
                "SELECT updated_at FROM challenges WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if stamp.is_empty() {
            return Ok(None);
        }
        DateTime::parse_from_rfc3339(&stamp)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| StoreError::Corrupt(format!("bad updated_at '{stamp}': {e}")))
    }

    fn hydrate(&self, rows: Vec<ChallengeRow>) -> Result<Vec<Challenge>, StoreError> {
        rows.into_iter()
            .map(|row| {
                let deposits = self.load_deposits(&row.id)?;
                build_challenge(row, deposits)
            })
            .collect()
    }

    /// Persist a transitioned challenge.
    ///
    /// `expected_version` is the version the caller loaded before applying
    /// the transition.
    ///
    /// # Errors
    /// [`StoreError::VersionConflict`] when another writer saved first,
    /// [`StoreError::NotFound`] when the challenge was deleted.
    pub fn save(&self, challenge: &Challenge, expected_version: u64) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE challenges
             SET title = ?1, icon = ?2, status = ?3, total_deposited = ?4,
                 linked_account_ref = ?5, version = ?6, updated_at = ?7
             WHERE id = ?8 AND version = ?9",
            params![
                challenge.title,
                challenge.icon,
                challenge.status.as_str(),
                challenge.total_deposited,
                challenge.linked_account_ref,
                to_version(challenge.version),
                Utc::now().to_rfc3339(),
                challenge.id,
                to_version(expected_version),
            ],
        )?;

        if updated == 0 {
            let found: Option<i64> = tx
                .query_row(
                    "SELECT version FROM challenges WHERE id = ?1",
                    params![challenge.id],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match found {
                Some(found) => {
                    tracing::warn!(
                        id = %challenge.id,
                        expected = expected_version,
                        found,
                        "rejected stale challenge write"
                    );
                    StoreError::VersionConflict {
                        id: challenge.id.clone(),
                        expected: expected_version,
                        found: u64::try_from(found).unwrap_or_default(),
                    }
                }
                None => StoreError::NotFound(challenge.id.clone()),
            });
        }

        tx.execute(
            "DELETE FROM deposits WHERE challenge_id = ?1",
            params![challenge.id],
        )?;
        Self::write_ledger(&tx, challenge)?;
        tx.commit()?;
        Ok(())
    }

    /// Load, run one ledger operation, and save under the loaded version.
    ///
    /// # Errors
    /// Engine errors are returned untouched (nothing is written); storage
    /// errors include [`StoreError::VersionConflict`].
    pub fn update_with<F>(&self, id: &str, operation: F) -> Result<Transition, CoreError>
    where
        F: FnOnce(&Challenge) -> Result<Transition, ChallengeError>,
    {
        let current = self.require(id)?;
        let transition = operation(&current)?;
        self.save(&transition.challenge, current.version())?;
        Ok(transition)
    }

    /// Hard delete a challenge and its ledger. Returns false if it did not exist.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM deposits WHERE challenge_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM challenges WHERE id = ?1", params![id])?;
        tx.commit()?;
        if removed > 0 {
            tracing::info!(id, "challenge deleted");
        }
        Ok(removed > 0)
    }

    fn write_ledger(conn: &Connection, challenge: &Challenge) -> Result<(), rusqlite::Error> {
        let mut stmt = conn.prepare(
            "INSERT INTO deposits (challenge_id, week, date, status, amount)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for deposit in challenge.deposits() {
            stmt.execute(params![
                challenge.id,
                deposit.week,
                deposit.date.to_string(),
                deposit.status.as_str(),
                deposit.amount,
            ])?;
        }
        Ok(())
    }

    fn load_deposits(&self, challenge_id: &str) -> Result<Vec<DepositRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT week, date, status, amount FROM deposits
             WHERE challenge_id = ?1 ORDER BY week",
        )?;
        let rows = stmt.query_map(params![challenge_id], |row| {
            Ok(DepositRow {
                week: row.get(0)?,
                date: row.get(1)?,
                status: row.get(2)?,
                amount: row.get(3)?,
            })
        })?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AllocationParams;
    use crate::challenge::{DepositRequest, NewChallenge};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 6).unwrap()
    }

    fn sample(id: &str) -> Challenge {
        Challenge::create(NewChallenge {
            id: Some(id.into()),
            title: "Holiday".into(),
            icon: "plane".into(),
            direction: Direction::Inverse,
            total_weeks: 6,
            target_amount: None,
            params: AllocationParams::Custom {
                start_amount: 500,
                step_amount: 250,
            },
            start_date: day(),
            linked_account_ref: Some("acct-1".into()),
        })
        .unwrap()
        .challenge
    }

    #[test]
    fn insert_and_get_round_trip() {
        let db = ChallengeDb::open_memory().unwrap();
        let c = sample("a");
        let c = c
            .record_deposit(DepositRequest::paid(1, 1_750, day()))
            .unwrap()
            .challenge;
        db.insert(&c).unwrap();
        assert_eq!(db.get("a").unwrap(), Some(c));
        assert!(db.get("missing").unwrap().is_none());
    }

    #[test]
    fn save_applies_transition() {
        let db = ChallengeDb::open_memory().unwrap();
        let c = sample("a");
        db.insert(&c).unwrap();

        let loaded = db.require("a").unwrap();
        let next = loaded
            .record_deposit(DepositRequest::paid(2, 1_500, day()))
            .unwrap()
            .challenge;
        db.save(&next, loaded.version()).unwrap();

        let stored = db.require("a").unwrap();
        assert_eq!(stored.total_deposited(), 1_500);
        assert_eq!(stored.version(), 1);
        assert_eq!(stored, next);
    }

    #[test]
    fn stale_write_is_rejected() {
        let db = ChallengeDb::open_memory().unwrap();
        db.insert(&sample("a")).unwrap();

        let reader_one = db.require("a").unwrap();
        let reader_two = db.require("a").unwrap();

        let first = reader_one
            .record_deposit(DepositRequest::paid(1, 1_750, day()))
            .unwrap()
            .challenge;
        db.save(&first, reader_one.version()).unwrap();

        let second = reader_two
            .record_deposit(DepositRequest::paid(2, 1_500, day()))
            .unwrap()
            .challenge;
        let err = db.save(&second, reader_two.version()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict { expected: 0, found: 1, .. }
        ));
        assert_eq!(db.require("a").unwrap().total_deposited(), 1_750);
    }

    #[test]
    fn save_of_deleted_challenge_is_not_found() {
        let db = ChallengeDb::open_memory().unwrap();
        let c = sample("a");
        db.insert(&c).unwrap();
        assert!(db.delete("a").unwrap());
        let next = c.toggle_pause().unwrap().challenge;
        assert!(matches!(db.save(&next, 0), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn list_by_status_filters_on_status() {
        let db = ChallengeDb::open_memory().unwrap();
        db.insert(&sample("a")).unwrap();
        db.insert(&sample("b")).unwrap();
        db.update_with("b", Challenge::cancel).unwrap();

        let active = db.list_by_status(ChallengeStatus::Active).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id(), "a");

        let cancelled = db.list_by_status(ChallengeStatus::Cancelled).unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id(), "b");
        assert!(db.list_by_status(ChallengeStatus::Paused).unwrap().is_empty());
    }

    #[test]
    fn updated_at_tracks_writes() {
        let db = ChallengeDb::open_memory().unwrap();
        let before = Utc::now();
        db.insert(&sample("a")).unwrap();
        let inserted = db.updated_at("a").unwrap().unwrap();
        assert!(inserted >= before);

        db.update_with("a", Challenge::toggle_pause).unwrap();
        let saved = db.updated_at("a").unwrap().unwrap();
        assert!(saved >= inserted);

        db.conn
            .execute("UPDATE challenges SET updated_at = '' WHERE id = 'a'", [])
            .unwrap();
        assert_eq!(db.updated_at("a").unwrap(), None);
        assert!(matches!(db.updated_at("missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_removes_ledger() {
        let db = ChallengeDb::open_memory().unwrap();
        let c = sample("a")
            .record_deposit(DepositRequest::paid(1, 1_750, day()))
            .unwrap()
            .challenge;
        db.insert(&c).unwrap();
        assert!(db.delete("a").unwrap());
        assert!(!db.delete("a").unwrap());
        let remaining: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM deposits", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn list_orders_by_start_date() {
        let db = ChallengeDb::open_memory().unwrap();
        db.insert(&sample("b")).unwrap();
        db.insert(&sample("a")).unwrap();
        let ids: Vec<String> = db.list().unwrap().iter().map(|c| c.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn corrupt_totals_are_detected_on_load() {
        let db = ChallengeDb::open_memory().unwrap();
        db.insert(&sample("a")).unwrap();
        db.conn
            .execute("UPDATE challenges SET total_deposited = 99 WHERE id = 'a'", [])
            .unwrap();
        assert!(matches!(db.get("a"), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn update_with_saves_only_successful_operations() {
        let db = ChallengeDb::open_memory().unwrap();
        db.insert(&sample("a")).unwrap();

        let t = db
            .update_with("a", |c| c.record_deposit(DepositRequest::paid(1, 1_750, day())))
            .unwrap();
        assert_eq!(t.challenge.total_deposited(), 1_750);

        let replay = db
            .update_with("a", |c| c.record_deposit(DepositRequest::paid(1, 1_750, day())))
            .unwrap_err();
        assert!(matches!(
            replay,
            CoreError::Challenge(ChallengeError::DuplicateDeposit { week: 1 })
        ));
        assert_eq!(db.require("a").unwrap().version(), 1);

        assert!(matches!(
            db.update_with("nope", |c| c.cancel()),
            Err(CoreError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn duplicate_insert_fails() {
        let db = ChallengeDb::open_memory().unwrap();
        db.insert(&sample("a")).unwrap();
        assert!(matches!(db.insert(&sample("a")), Err(StoreError::Database(_))));
    }
}
