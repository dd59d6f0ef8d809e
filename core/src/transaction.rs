//! Bet and win domain events.
//!
//! A simulated wager produces exactly one [`BetEvent`] and one [`WinEvent`].
//! The win is always derived from its bet through [`EventPair::settle`], so the
//! identifiers they share can never drift apart.
//!
//! On the wire both shapes are JSON objects with camelCase fields and a leading
//! `eventType` discriminator (`"BET"` or `"WIN"`):
//!
//! ```text
//! {"eventType":"BET","eventId":"…","timestamp":1735689600000,"betId":"bet-…",
//!  "playerId":"player-4242","gameId":"GAME_KAFKA_TEST","brandId":"brand-c",
//!  "sessionId":"…","currency":"USD","amount":50.0,"version":1}
//! ```

use crate::event::Event;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Schema version stamped on every event.
pub const EVENT_VERSION: u32 = 1;

/// Discriminator value for bets.
pub const BET_EVENT_TYPE: &str = "BET";

/// Discriminator value for wins.
pub const WIN_EVENT_TYPE: &str = "WIN";

/// Money amount in cents, always rounded to exactly two decimal places.
///
/// Serialized as a JSON number in currency units (`12.5` for 1250 cents).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Rounds a currency value half away from zero to two decimals.
    ///
    /// Returns `None` for negative or non-finite values.
    ///
    /// ```
    /// use betstream_core::transaction::Amount;
    ///
    /// assert_eq!(Amount::round2(12.346).map(|a| a.cents()), Some(1235));
    /// assert_eq!(Amount::round2(-1.0), None);
    /// ```
    #[must_use]
    pub fn round2(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        Some(Self::round_non_negative(value))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // caller guarantees finite, >= 0
    fn round_non_negative(value: f64) -> Self {
        Self((value * 100.0).round() as u64)
    }

    /// Returns the value in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the value in currency units
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // amounts stay far below 2^52 cents
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Self::round2(value).ok_or_else(|| {
            serde::de::Error::custom(format!("amount must be a finite non-negative number, got {value}"))
        })
    }
}

/// Multiplier applied to a bet amount to compute the win.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct PayoutMultiplier(f64);

impl PayoutMultiplier {
    /// Smallest multiplier the simulator draws.
    pub const MIN: f64 = 0.5;

    /// Largest multiplier the simulator draws.
    pub const MAX: f64 = 3.5;

    /// Creates a multiplier, rejecting values outside `[MIN, MAX]`.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    /// Creates a multiplier, pulling out-of-range values onto the nearest bound.
    ///
    /// `NaN` becomes [`Self::MIN`].
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self(Self::MIN);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    /// Returns the raw multiplier
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.0
    }
}

/// A simulated wager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetEvent {
    /// Unique id of this event (uuid)
    pub event_id: String,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    /// Wager id, shared with the paired win
    pub bet_id: String,
    /// Player placing the wager
    pub player_id: String,
    /// Game the wager was placed on
    pub game_id: String,
    /// Brand operating the game
    pub brand_id: String,
    /// Session id, also used as the partition key
    pub session_id: String,
    /// ISO currency code
    pub currency: String,
    /// Stake
    pub amount: Amount,
    /// Schema version
    pub version: u32,
}

/// The settlement of a [`BetEvent`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinEvent {
    /// Unique id of this event (uuid)
    pub event_id: String,
    /// Bet time plus the settlement delay, in epoch milliseconds
    pub timestamp: i64,
    /// Id of the settled bet
    pub bet_id: String,
    /// Player of the settled bet
    pub player_id: String,
    /// Session of the settled bet
    pub session_id: String,
    /// Game of the settled bet
    pub game_id: String,
    /// Brand of the settled bet
    pub brand_id: String,
    /// Currency of the settled bet
    pub currency: String,
    /// Payout
    pub win_amount: Amount,
    /// Schema version
    pub version: u32,
}

/// Either event, tagged by `eventType`.
///
/// This is the shape published to the transactions topic and the shape a
/// consumer decodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum TransactionEvent {
    /// A wager
    #[serde(rename = "BET")]
    Bet(BetEvent),
    /// A settlement
    #[serde(rename = "WIN")]
    Win(WinEvent),
}

impl TransactionEvent {
    /// Id of the wager this event belongs to
    #[must_use]
    pub fn bet_id(&self) -> &str {
        match self {
            Self::Bet(bet) => &bet.bet_id,
            Self::Win(win) => &win.bet_id,
        }
    }

    /// Session id (the partition key)
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Bet(bet) => &bet.session_id,
            Self::Win(win) => &win.session_id,
        }
    }

    /// Brand the event belongs to
    #[must_use]
    pub fn brand_id(&self) -> &str {
        match self {
            Self::Bet(bet) => &bet.brand_id,
            Self::Win(win) => &win.brand_id,
        }
    }
}

impl Event for TransactionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Bet(_) => BET_EVENT_TYPE,
            Self::Win(_) => WIN_EVENT_TYPE,
        }
    }
}

impl From<BetEvent> for TransactionEvent {
    fn from(bet: BetEvent) -> Self {
        Self::Bet(bet)
    }
}

impl From<WinEvent> for TransactionEvent {
    fn from(win: WinEvent) -> Self {
        Self::Win(win)
    }
}

/// A bet and the win derived from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventPair {
    /// The wager
    pub bet: BetEvent,
    /// Its settlement
    pub win: WinEvent,
}

impl EventPair {
    /// Settles `bet` with the given multiplier.
    ///
    /// The win copies every shared identifier from the bet, is stamped
    /// `win_delay` after the bet, and pays `round2(amount × multiplier)`.
    ///
    /// ```
    /// use betstream_core::transaction::{Amount, BetEvent, EventPair, PayoutMultiplier};
    /// use std::time::Duration;
    ///
    /// let bet = BetEvent {
    ///     event_id: "e-1".to_string(),
    ///     timestamp: 1_000,
    ///     bet_id: "bet-1".to_string(),
    ///     player_id: "player-1000".to_string(),
    ///     game_id: "GAME_KAFKA_TEST".to_string(),
    ///     brand_id: "brand-a".to_string(),
    ///     session_id: "s-1".to_string(),
    ///     currency: "USD".to_string(),
    ///     amount: Amount::from_cents(5_000),
    ///     version: 1,
    /// };
    /// let multiplier = PayoutMultiplier::new(2.0).unwrap();
    /// let pair = EventPair::settle(bet, multiplier, "e-2".to_string(), Duration::from_secs(5));
    ///
    /// assert_eq!(pair.win.win_amount, Amount::from_cents(10_000));
    /// assert_eq!(pair.win.timestamp, 6_000);
    /// ```
    #[must_use]
    pub fn settle(
        bet: BetEvent,
        multiplier: PayoutMultiplier,
        win_event_id: String,
        win_delay: Duration,
    ) -> Self {
        let delay_ms = i64::try_from(win_delay.as_millis()).unwrap_or(i64::MAX);
        let win = WinEvent {
            event_id: win_event_id,
            timestamp: bet.timestamp.saturating_add(delay_ms),
            bet_id: bet.bet_id.clone(),
            player_id: bet.player_id.clone(),
            session_id: bet.session_id.clone(),
            game_id: bet.game_id.clone(),
            brand_id: bet.brand_id.clone(),
            currency: bet.currency.clone(),
            win_amount: Amount::round_non_negative(bet.amount.as_f64() * multiplier.value()),
            version: EVENT_VERSION,
        };

        Self { bet, win }
    }
}
