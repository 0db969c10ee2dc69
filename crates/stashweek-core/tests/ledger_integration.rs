//! Integration tests for the challenge lifecycle across engine and storage.

use chrono::NaiveDate;
use stashweek_core::{
    find_template, get_progress, recompute_totals, AllocationParams, Challenge, ChallengeDb,
    ChallengeError, ChallengeStatus, CoreError, DepositRequest, Direction, Event, NewChallenge,
    StoreError,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn four_week_challenge() -> Challenge {
    Challenge::create(NewChallenge {
        id: Some("short".into()),
        title: "Four weeks".into(),
        icon: "coin".into(),
        direction: Direction::Standard,
        total_weeks: 4,
        target_amount: Some(20_000),
        params: AllocationParams::template(),
        start_date: date(2026, 6, 1),
        linked_account_ref: Some("savings-acct".into()),
    })
    .unwrap()
    .challenge
}

#[test]
fn replaying_a_deposit_does_not_double_count() {
    let c = four_week_challenge();
    let once = c
        .record_deposit(DepositRequest::paid(3, 4_000, date(2026, 6, 15)))
        .unwrap()
        .challenge;

    let replay = once.record_deposit(DepositRequest::paid(3, 4_000, date(2026, 6, 15)));
    let twice = match replay {
        Ok(t) => t.challenge,
        Err(e) if e.is_idempotent_replay() => once.clone(),
        Err(e) => panic!("unexpected error: {e}"),
    };
    assert_eq!(twice.total_deposited(), once.total_deposited());
    assert_eq!(twice.total_deposited(), 4_000);
}

#[test]
fn completes_exactly_on_fourth_distinct_paid_week() {
    let mut c = four_week_challenge();
    for (i, week) in [2u32, 4, 1, 3].into_iter().enumerate() {
        let amount = c.scheduled_amount(week).unwrap();
        let t = c
            .record_deposit(DepositRequest::paid(week, amount, date(2026, 6, 1)))
            .unwrap();
        c = t.challenge;
        let expected = if i == 3 {
            ChallengeStatus::Completed
        } else {
            ChallengeStatus::Active
        };
        assert_eq!(c.status(), expected);
    }
    assert_eq!(c.total_deposited(), 20_000);
    assert_eq!(recompute_totals(&c), Some(c.total_deposited()));

    let progress = get_progress(&c, date(2026, 6, 20));
    assert!(progress.is_complete);
    assert_eq!(progress.next_unpaid_week, None);
    assert!((progress.percent - 100.0).abs() < 1e-9);

    let err = c
        .record_deposit(DepositRequest::paid(1, 1, date(2026, 6, 20)))
        .unwrap_err();
    assert_eq!(
        err,
        ChallengeError::ChallengeClosed {
            status: ChallengeStatus::Completed
        }
    );
}

#[test]
fn linked_transaction_event_carries_account() {
    let t = four_week_challenge()
        .record_deposit(DepositRequest::paid(1, 8_000, date(2026, 6, 1)).linked())
        .unwrap();
    let linked: Vec<_> = t
        .events
        .iter()
        .filter(|e| matches!(e, Event::LinkedTransactionRequested { .. }))
        .collect();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].challenge_id(), "short");
}

#[test]
fn template_challenge_persists_through_lifecycle() {
    let template = find_template("classic-5k").unwrap();
    let created =
        Challenge::create(NewChallenge::from_template(template, date(2026, 1, 5))).unwrap();
    assert!(matches!(created.events[..], [Event::ChallengeCreated { .. }]));
    let c = created.challenge;
    let id = c.id().to_string();
    assert_eq!(c.weekly_amounts().iter().sum::<i64>(), 500_000);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stashweek.db");
    {
        let db = ChallengeDb::open_at(&path).unwrap();
        db.insert(&c).unwrap();
        let first = c.scheduled_amount(1).unwrap();
        db.update_with(&id, |c| {
            c.record_deposit(DepositRequest::paid(1, first, date(2026, 1, 6)))
        })
        .unwrap();
        db.update_with(&id, Challenge::toggle_pause).unwrap();
    }

    let db = ChallengeDb::open_at(&path).unwrap();
    let stored = db.require(&id).unwrap();
    assert_eq!(stored.status(), ChallengeStatus::Paused);
    assert_eq!(stored.paid_week_count(), 1);
    assert_eq!(stored.version(), 2);

    let progress = get_progress(&stored, date(2026, 2, 2));
    assert_eq!(progress.current_week, 5);
    assert_eq!(progress.next_unpaid_week, Some(2));
    assert_eq!(progress.projected_completion_date, date(2027, 1, 4));

    db.update_with(&id, Challenge::cancel).unwrap();
    let err = db.update_with(&id, Challenge::toggle_pause).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Challenge(ChallengeError::ChallengeClosed {
            status: ChallengeStatus::Cancelled
        })
    ));

    assert!(db.delete(&id).unwrap());
    assert!(matches!(db.require(&id), Err(StoreError::NotFound(_))));
}

#[test]
fn json_shape_keeps_integer_amounts() {
    let c = four_week_challenge()
        .record_deposit(DepositRequest::paid(1, 8_000, date(2026, 6, 1)))
        .unwrap()
        .challenge;
    let json = serde_json::to_value(&c).unwrap();
    for key in [
        "id",
        "mode",
        "direction",
        "total_weeks",
        "target_amount",
        "weekly_amounts",
        "start_date",
        "status",
        "ledger",
        "total_deposited",
        "linked_account_ref",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert!(json["total_deposited"].is_i64());
    assert!(json["weekly_amounts"][0].is_i64());
    assert_eq!(json["ledger"][0]["amount"], 8_000);
}
