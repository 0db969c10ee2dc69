//! Property tests for the schedule allocator.

use proptest::prelude::*;
use stashweek_core::{allocate, AllocationParams, ChallengeError, Direction};

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Standard), Just(Direction::Inverse)]
}

/// (weeks, target) pairs where the template floor can be honoured.
fn template_input() -> impl Strategy<Value = (u32, i64)> {
    (1u32..=156).prop_flat_map(|weeks| (Just(weeks), (5 * i64::from(weeks))..=1_000_000))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn template_sum_and_length_are_exact((weeks, target) in template_input(), dir in direction()) {
        let amounts = allocate(target, weeks, dir, &AllocationParams::template()).unwrap();
        prop_assert_eq!(amounts.len(), weeks as usize);
        prop_assert_eq!(amounts.iter().sum::<i64>(), target);
    }

    #[test]
    fn template_weeks_respect_floor((weeks, target) in template_input(), dir in direction()) {
        let amounts = allocate(target, weeks, dir, &AllocationParams::template()).unwrap();
        prop_assert!(amounts.iter().all(|&a| a >= 5), "{:?}", amounts);
    }

    #[test]
    fn template_below_floor_fails_fast(weeks in 1u32..=156, shortfall in 1i64..=5, dir in direction()) {
        let target = (5 * i64::from(weeks) - shortfall).max(0);
        let err = allocate(target, weeks, dir, &AllocationParams::template()).unwrap_err();
        prop_assert!(matches!(err, ChallengeError::InvalidScheduleParams(_)));
    }

    #[test]
    fn directions_differ_but_both_stay_exact(weeks in 8u32..=156, per_week in 1_000i64..=6_000) {
        let target = per_week * i64::from(weeks);
        let standard = allocate(target, weeks, Direction::Standard, &AllocationParams::template()).unwrap();
        let inverse = allocate(target, weeks, Direction::Inverse, &AllocationParams::template()).unwrap();
        prop_assert_eq!(standard.iter().sum::<i64>(), target);
        prop_assert_eq!(inverse.iter().sum::<i64>(), target);

        let reversed: Vec<i64> = standard.iter().rev().copied().collect();
        prop_assert_ne!(reversed, inverse);
    }

    #[test]
    fn custom_progression_is_exact(
        weeks in 1u32..=156,
        start in 0i64..=10_000,
        step in 0i64..=500,
        dir in direction(),
    ) {
        let params = AllocationParams::Custom { start_amount: start, step_amount: step };
        let target = stashweek_core::allocator::progression_total(weeks, start, step).unwrap();
        let amounts = allocate(target, weeks, dir, &params).unwrap();
        prop_assert_eq!(amounts.len(), weeks as usize);
        prop_assert_eq!(amounts.iter().sum::<i64>(), target);
        prop_assert!(amounts.iter().all(|&a| a >= 0));
    }
}

#[test]
fn fifty_two_week_five_thousand() {
    let amounts = allocate(500_000, 52, Direction::Standard, &AllocationParams::template()).unwrap();
    assert_eq!(amounts.len(), 52);
    assert_eq!(amounts.iter().sum::<i64>(), 500_000);
    assert!(amounts[0] > amounts[3]);
    assert!(amounts[48] > amounts[0]);
}

#[test]
fn thirteen_weeks_has_partial_last_month() {
    for dir in [Direction::Standard, Direction::Inverse] {
        let amounts = allocate(260_000, 13, dir, &AllocationParams::template()).unwrap();
        assert_eq!(amounts.len(), 13);
        assert_eq!(amounts.iter().sum::<i64>(), 260_000);
        // One-week month gets its whole monthly share (adjusted weight 1.0),
        // so it outweighs every week of the three full months.
        assert!(amounts[..12].iter().all(|&a| a < amounts[12]));
    }
}
