//! Property tests for amount rounding and bet settlement.

#![allow(clippy::unwrap_used)]

use betstream_core::transaction::{Amount, BetEvent, EventPair, PayoutMultiplier, EVENT_VERSION};
use proptest::prelude::*;
use std::time::Duration;

fn bet_with(amount: Amount, timestamp: i64) -> BetEvent {
    BetEvent {
        event_id: "evt-bet".to_string(),
        timestamp,
        bet_id: "bet-prop".to_string(),
        player_id: "player-1000".to_string(),
        game_id: "GAME_KAFKA_TEST".to_string(),
        brand_id: "brand-a".to_string(),
        session_id: "session-prop".to_string(),
        currency: "USD".to_string(),
        amount,
        version: EVENT_VERSION,
    }
}

proptest! {
    #[test]
    fn round2_stays_within_half_a_cent(value in 0.0f64..1_000_000.0) {
        let amount = Amount::round2(value).unwrap();
        prop_assert!((amount.as_f64() - value).abs() <= 0.005 + 1e-9);
    }

    #[test]
    fn settled_win_matches_rounded_product(
        cents in 100u64..=10_000,
        multiplier in PayoutMultiplier::MIN..=PayoutMultiplier::MAX,
        timestamp in 0i64..4_102_444_800_000,
    ) {
        let amount = Amount::from_cents(cents);
        let pair = EventPair::settle(
            bet_with(amount, timestamp),
            PayoutMultiplier::new(multiplier).unwrap(),
            "evt-win".to_string(),
            Duration::from_millis(5_000),
        );

        prop_assert_eq!(Some(pair.win.win_amount), Amount::round2(amount.as_f64() * multiplier));
        prop_assert_eq!(pair.win.timestamp, timestamp + 5_000);
        prop_assert_eq!(&pair.win.bet_id, &pair.bet.bet_id);
        prop_assert_eq!(&pair.win.session_id, &pair.bet.session_id);
    }
}
