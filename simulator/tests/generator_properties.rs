//! Property tests for generated bet/win pairs.

#![allow(clippy::unwrap_used)]

use betstream_core::transaction::{Amount, PayoutMultiplier};
use betstream_simulator::BetGenerator;
use betstream_simulator::generator::{BRANDS, CURRENCY, GAME_ID};
use betstream_testing::test_clock;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

proptest! {
    #[test]
    fn generated_pairs_stay_in_range(seed in any::<u64>(), draws in 1usize..20) {
        let mut generator = BetGenerator::seeded(seed, Arc::new(test_clock()), Duration::from_secs(5));

        for _ in 0..draws {
            let pair = generator.next_pair();
            let bet = &pair.bet;
            let win = &pair.win;

            prop_assert!((100..=10_000).contains(&bet.amount.cents()));
            prop_assert!(BRANDS.contains(&bet.brand_id.as_str()));
            prop_assert_eq!(&bet.game_id, GAME_ID);
            prop_assert_eq!(&bet.currency, CURRENCY);

            let player: u32 = bet.player_id.strip_prefix("player-").unwrap().parse().unwrap();
            prop_assert!((1000..=9999).contains(&player));

            let low = Amount::round2(bet.amount.as_f64() * PayoutMultiplier::MIN).unwrap();
            let high = Amount::round2(bet.amount.as_f64() * PayoutMultiplier::MAX).unwrap();
            prop_assert!(win.win_amount >= low && win.win_amount <= high);

            prop_assert_eq!(&win.bet_id, &bet.bet_id);
            prop_assert_eq!(&win.session_id, &bet.session_id);
            prop_assert_eq!(&win.player_id, &bet.player_id);
            prop_assert_eq!(&win.brand_id, &bet.brand_id);
            prop_assert_eq!(win.timestamp, bet.timestamp + 5_000);
            prop_assert_ne!(&win.event_id, &bet.event_id);
        }
    }
}
