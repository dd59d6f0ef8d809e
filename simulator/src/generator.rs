//! Random bet generation.
//!
//! Every draw goes through one random source, so a seeded generator replays
//! the same bets (identifiers included) run after run.

use betstream_core::environment::Clock;
use betstream_core::transaction::{Amount, BetEvent, EVENT_VERSION, EventPair, PayoutMultiplier};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

/// Brands a bet is attributed to, chosen uniformly.
pub const BRANDS: [&str; 6] = ["brand-a", "brand-b", "brand-c", "brand-d", "brand-e", "brand-f"];

/// Game every simulated bet is placed on.
pub const GAME_ID: &str = "GAME_KAFKA_TEST";

/// Currency of every simulated bet.
pub const CURRENCY: &str = "USD";

/// Smallest stake, in currency units.
pub const MIN_STAKE: f64 = 1.0;

/// Largest stake, in currency units.
pub const MAX_STAKE: f64 = 100.0;

/// Produces bets and settles them into [`EventPair`]s.
pub struct BetGenerator<R = StdRng> {
    rng: R,
    clock: Arc<dyn Clock>,
    win_delay: Duration,
}

impl BetGenerator<StdRng> {
    /// Generator seeded from the OS.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, win_delay: Duration) -> Self {
        Self::with_rng(StdRng::from_entropy(), clock, win_delay)
    }

    /// Deterministic generator for tests and replays.
    #[must_use]
    pub fn seeded(seed: u64, clock: Arc<dyn Clock>, win_delay: Duration) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), clock, win_delay)
    }
}

impl<R: Rng> BetGenerator<R> {
    /// Generator over an arbitrary random source.
    #[must_use]
    pub fn with_rng(rng: R, clock: Arc<dyn Clock>, win_delay: Duration) -> Self {
        Self {
            rng,
            clock,
            win_delay,
        }
    }

    /// Delay between a bet and its win.
    #[must_use]
    pub const fn win_delay(&self) -> Duration {
        self.win_delay
    }

    /// Draws a bet with a random stake and settles it with a random multiplier.
    ///
    /// The stake is uniform in `[1.00, 100.00]` and the multiplier uniform in
    /// `[0.5, 3.5]`.
    pub fn next_pair(&mut self) -> EventPair {
        let stake = self.rng.gen_range(MIN_STAKE..=MAX_STAKE);
        // finite and positive, so rounding cannot fail
        let amount = Amount::round2(stake).unwrap_or(Amount::ZERO);
        let multiplier = PayoutMultiplier::clamped(
            self.rng
                .gen_range(PayoutMultiplier::MIN..=PayoutMultiplier::MAX),
        );
        self.pair_with(amount, multiplier)
    }

    /// Draws identifiers for a bet with a fixed stake and multiplier.
    pub fn pair_with(&mut self, amount: Amount, multiplier: PayoutMultiplier) -> EventPair {
        let bet = BetEvent {
            event_id: self.next_uuid(),
            timestamp: self.clock.now_millis(),
            bet_id: format!("bet-{}", self.next_uuid()),
            player_id: format!("player-{}", self.rng.gen_range(1000..10_000)),
            game_id: GAME_ID.to_string(),
            brand_id: BRANDS[self.rng.gen_range(0..BRANDS.len())].to_string(),
            session_id: self.next_uuid(),
            currency: CURRENCY.to_string(),
            amount,
            version: EVENT_VERSION,
        };
        let win_event_id = self.next_uuid();

        EventPair::settle(bet, multiplier, win_event_id, self.win_delay)
    }

    fn next_uuid(&mut self) -> String {
        uuid::Builder::from_random_bytes(self.rng.r#gen())
            .into_uuid()
            .hyphenated()
            .to_string()
    }
}
