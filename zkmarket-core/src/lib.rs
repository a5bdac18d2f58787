//! # zkmarket Core
//!
//! Ledger engine for private binary prediction markets.
//!
//! Bettors place wagers as commitments: the ledger stores only
//! `SHA-256(domain || outcome || amount || blinding)` and never sees the
//! outcome or amount until the market closes. The engine covers:
//!
//! - **Commitment Codec**: commit to and open wagers
//! - **Market Store**: market records and their `Open → Closed → Settled` lifecycle
//! - **Bet Ledger**: one outstanding bet per bettor per market, claim-once payouts
//! - **Settlement**: outcome resolution and pari-mutuel payouts
//! - **Ledger API**: the concurrent, per-market-locked surface over all of the above
//!
//! ## Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use zkmarket_core::{
//!     commit_random, BettorHandle, Category, Ledger, LedgerConfig, MarketParams, Outcome,
//!     SystemClock, TrustingVerifier,
//! };
//!
//! let ledger = Ledger::new(
//!     LedgerConfig::default(),
//!     Arc::new(SystemClock),
//!     Arc::new(TrustingVerifier),
//! );
//!
//! let market_id = ledger.create_market(MarketParams {
//!     question: "Will it rain tomorrow in San Francisco?".to_string(),
//!     description: "Resolves YES if SFO records any precipitation.".to_string(),
//!     category: Category::Entertainment,
//!     closing_time: Utc::now() + Duration::hours(1),
//!     resolution_source: "NOAA".to_string(),
//!     creator: None,
//! })?;
//!
//! // The bettor keeps `secret`; the ledger only ever sees `commitment`.
//! let (commitment, secret) = commit_random(Outcome::Yes, 250)?;
//! let bet_id = ledger.place_bet(market_id, BettorHandle::new("alice"), commitment)?;
//! assert!(secret.opens(&ledger.get_bet(bet_id)?.commitment));
//! Ok::<(), zkmarket_core::LedgerError>(())
//! ```

pub mod bet;
pub mod clock;
pub mod commitment;
pub mod config;
pub mod error;
pub mod ledger;
pub mod market;
pub mod proof;
pub mod settlement;
pub mod store;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use bet::{Bet, BetId, BetStatus, BettorHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commitment::{
    commit, commit_random, verify, BlindingFactor, Commitment, Decommitment, Outcome, WagerLevel,
    MAX_WAGER, MIN_WAGER,
};
pub use config::{CreatorPolicy, LedgerConfig};
pub use error::{ErrorKind, LedgerError, Result};
pub use ledger::{BettorStats, Ledger, LedgerSnapshot};
pub use market::{Category, Market, MarketFilter, MarketId, MarketParams, MarketStatus, MarketView};
pub use proof::{OpeningVerifier, ProofVerifier, TrustingVerifier};
pub use settlement::{ExceptionReason, Reveal, RevealedWager, SettlementException, SettlementReport};
pub use utils::*;
