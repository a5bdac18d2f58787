//! Common test utilities for zkmarket-core tests.
//!
//! Fixed clock, standard market parameters, wager helpers, and ledger setup
//! shared by the unit tests of every module.

use crate::bet::BettorHandle;
use crate::clock::ManualClock;
use crate::commitment::{commit_random, Commitment, Decommitment, Outcome};
use crate::config::LedgerConfig;
use crate::ledger::Ledger;
use crate::market::{Category, Market, MarketParams};
use crate::proof::{ProofVerifier, TrustingVerifier};
use crate::settlement::{Reveal, RevealedWager};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Standard "now" for tests (Jan 1, 2025).
pub fn test_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_689_600, 0).unwrap()
}

/// Parameters for a crypto market closing `closes_in` after `test_now()`.
pub fn market_params(closes_in: Duration) -> MarketParams {
    MarketParams {
        question: "Will Bitcoin trade above $100,000 by June 30?".to_string(),
        description: "Resolves YES if any major exchange prints above $100,000.".to_string(),
        category: Category::Crypto,
        closing_time: test_now() + closes_in,
        resolution_source: "CoinGecko daily close".to_string(),
        creator: None,
    }
}

/// An open market closing one hour after `test_now()`.
pub fn open_market() -> Market {
    Market::new(market_params(Duration::hours(1)), test_now(), 2_000).unwrap()
}

pub fn handle(name: &str) -> BettorHandle {
    BettorHandle::new(name)
}

/// A fresh commitment and its opening.
pub fn wager(outcome: Outcome, amount: u64) -> (Commitment, Decommitment) {
    commit_random(outcome, amount).unwrap()
}

/// The reveal a bettor would submit for `decommitment`.
pub fn reveal_of(decommitment: &Decommitment) -> Reveal {
    Reveal {
        outcome: decommitment.outcome,
        amount: decommitment.amount,
        proof: decommitment.blinding.as_bytes().to_vec(),
    }
}

/// What the ledger keeps after `reveal_of(decommitment)` is accepted.
pub fn revealed_of(decommitment: &Decommitment) -> RevealedWager {
    RevealedWager {
        outcome: decommitment.outcome,
        amount: decommitment.amount,
    }
}

/// Refuses every attestation.
pub struct RejectingVerifier;

impl ProofVerifier for RejectingVerifier {
    fn attest_commitment(&self, _commitment: &Commitment) -> bool {
        false
    }

    fn attest_reveal(&self, _commitment: &Commitment, _reveal: &Reveal) -> bool {
        false
    }
}

/// Ledger with default config, a trusting verifier, and a manual clock at
/// `test_now()`.
pub fn test_ledger() -> (Ledger, Arc<ManualClock>) {
    test_ledger_with(LedgerConfig::default(), Arc::new(TrustingVerifier))
}

pub fn test_ledger_with(
    config: LedgerConfig,
    verifier: Arc<dyn ProofVerifier>,
) -> (Ledger, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(test_now()));
    let ledger = Ledger::new(config, clock.clone(), verifier);
    (ledger, clock)
}
