//! # Ledger API
//!
//! The orchestration surface over the market store, bet ledger, and settlement
//! engine. Every operation resolves the affected market's unit, takes that
//! unit's lock, reads `now` from the clock inside the lock, and either fully
//! applies or fails without a partial write. Proof checks run before the lock
//! is taken.
//!
//! Errors from the components below are returned as-is; nothing is retried.

use crate::{
    bet::{Bet, BetId, BetStatus, BettorHandle},
    clock::Clock,
    commitment::{Commitment, Decommitment, Outcome},
    config::LedgerConfig,
    error::Result,
    market::{MarketFilter, MarketId, MarketParams, MarketStatus, MarketView},
    proof::ProofVerifier,
    settlement::{self, Reveal, RevealedWager, SettlementException, SettlementReport},
    store::{lock, MarketBook, MarketRecord, MarketStore},
    LedgerError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Per-bettor summary, as shown on a dashboard.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BettorStats {
    pub total: usize,
    pub pending: usize,
    pub won: usize,
    pub lost: usize,
    pub claimed: usize,
    pub claimed_payout: u64,
    /// Won bets over decided bets, 0.0 when nothing is decided yet
    pub win_rate: f64,
}

/// Full serializable copy of a ledger.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LedgerSnapshot {
    pub markets: Vec<MarketRecord>,
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The prediction-market ledger.
pub struct Ledger {
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    verifier: Arc<dyn ProofVerifier>,
    store: MarketStore,
    bet_index: RwLock<HashMap<BetId, MarketId>>,
    bettor_index: RwLock<HashMap<BettorHandle, Vec<BetId>>>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new(
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Self {
        Self {
            config,
            clock,
            verifier,
            store: MarketStore::new(),
            bet_index: RwLock::new(HashMap::new()),
            bettor_index: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild a ledger from a snapshot.
    pub fn restore(
        snapshot: LedgerSnapshot,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Self {
        let ledger = Self::new(config, clock, verifier);
        {
            let mut bet_index = ledger.bet_index.write().unwrap_or_else(PoisonError::into_inner);
            let mut bettor_index = ledger
                .bettor_index
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            for record in snapshot.markets {
                for bet in &record.bets {
                    bet_index.insert(bet.id, bet.market_id);
                    bettor_index
                        .entry(bet.bettor_handle.clone())
                        .or_default()
                        .push(bet.id);
                }
                ledger.store.insert(MarketBook::from(record));
            }
        }

        info!(markets = ledger.store.len(), "Ledger restored");
        ledger
    }

    /// Copy out every market unit, one lock at a time.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let markets = self
            .store
            .units()
            .iter()
            .map(|unit| MarketRecord::from(&*lock(unit)))
            .collect();
        LedgerSnapshot { markets }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Create a market.
    ///
    /// Fails with `CreatorNotAllowed` under an allowlist policy, with
    /// `InvalidClosingTime` if the closing time is not in the future, and with
    /// `InvalidMarket` for bad text fields.
    pub fn create_market(&self, params: MarketParams) -> Result<MarketId> {
        self.config
            .creator_policy
            .authorize(params.creator.as_deref())?;

        let category = params.category;
        let closing_time = params.closing_time;
        let id = self
            .store
            .create(params, self.clock.now(), self.config.max_text_len)?;

        info!(market = %id, %category, %closing_time, "Market created");
        Ok(id)
    }

    /// Place a bet.
    ///
    /// The commitment is attested before the market lock is taken. Under the
    /// lock the market is re-checked against the clock, the duplicate check
    /// runs, and `bet_count` is bumped, all in one step.
    pub fn place_bet(
        &self,
        market_id: MarketId,
        bettor_handle: BettorHandle,
        commitment: Commitment,
    ) -> Result<BetId> {
        if !self.verifier.attest_commitment(&commitment) {
            return Err(LedgerError::ProofRejected(
                "commitment attestation failed".to_string(),
            ));
        }

        let unit = self.store.unit(market_id)?;
        let bet_id = {
            let mut book = lock(&unit);
            let MarketBook { market, bets, .. } = &mut *book;
            bets.place(market, bettor_handle.clone(), commitment, self.clock.now())?
        };

        self.bet_index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bet_id, market_id);
        self.bettor_index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(bettor_handle.clone())
            .or_default()
            .push(bet_id);

        info!(market = %market_id, bet = %bet_id, bettor = bettor_handle.short(), "Bet placed");
        Ok(bet_id)
    }

    /// Close a market ahead of its closing time. Idempotent.
    pub fn close_market(&self, market_id: MarketId) -> Result<MarketView> {
        if self.store.transition_to_closed(market_id)? {
            info!(market = %market_id, "Market closed");
        } else {
            debug!(market = %market_id, "Market already closed");
        }
        self.store.get(market_id, self.clock.now())
    }

    /// Record which side a bet backed, for use at settlement.
    ///
    /// Accepted only while the market is closed and unsettled, once per bet,
    /// and only if the proof capability attests the reveal against the bet's
    /// commitment. Only the outcome and amount are kept; the proof is dropped.
    pub fn submit_reveal(&self, bet_id: BetId, reveal: Reveal) -> Result<()> {
        let unit = self.store.unit(self.market_of(bet_id)?)?;

        let commitment = {
            let mut book = lock(&unit);
            check_reveal_window(&mut book, bet_id, self.clock.now())?
        };

        if !self.verifier.attest_reveal(&commitment, &reveal) {
            return Err(LedgerError::ProofRejected(format!(
                "reveal attestation failed for bet {bet_id}"
            )));
        }

        let mut book = lock(&unit);
        check_reveal_window(&mut book, bet_id, self.clock.now())?;
        book.reveals.insert(bet_id, RevealedWager::from(&reveal));

        debug!(bet = %bet_id, "Reveal recorded");
        Ok(())
    }

    /// Resolve a market and settle its bets.
    pub fn resolve_market(
        &self,
        market_id: MarketId,
        outcome: Outcome,
    ) -> Result<SettlementReport> {
        let unit = self.store.unit(market_id)?;
        let mut book = lock(&unit);
        let MarketBook {
            market,
            bets,
            reveals,
            exceptions,
        } = &mut *book;

        let report = settlement::settle(market, bets, reveals, outcome, self.clock.now())?;
        exceptions.extend(report.exceptions.iter().cloned());

        Ok(report)
    }

    /// Redeem a won bet exactly once.
    ///
    /// The decommitment must open the bet's commitment and match the reveal
    /// the bet was settled on, which in turn must back the winning outcome.
    pub fn claim_winnings(&self, bet_id: BetId, decommitment: &Decommitment) -> Result<u64> {
        let market_id = self.market_of(bet_id)?;
        let unit = self.store.unit(market_id)?;
        let payout = {
            let mut book = lock(&unit);
            let MarketBook {
                market,
                bets,
                reveals,
                ..
            } = &mut *book;
            let revealed = reveals
                .get(&bet_id)
                .filter(|wager| market.outcome == Some(wager.outcome));
            bets.claim(bet_id, decommitment, revealed)?
        };

        info!(market = %market_id, bet = %bet_id, "Winnings claimed");
        Ok(payout)
    }

    pub fn get_market(&self, market_id: MarketId) -> Result<MarketView> {
        self.store.get(market_id, self.clock.now())
    }

    /// Markets matching `filter`, in creation order.
    pub fn list_markets(&self, filter: &MarketFilter) -> Vec<MarketView> {
        let now = self.clock.now();
        self.store
            .units()
            .iter()
            .filter_map(|unit| {
                let mut book = lock(unit);
                book.market.sync(now);
                filter
                    .matches(&book.market)
                    .then(|| book.market.view())
            })
            .collect()
    }

    pub fn get_bet(&self, bet_id: BetId) -> Result<Bet> {
        let unit = self.store.unit(self.market_of(bet_id)?)?;
        let bet = lock(&unit)
            .bets
            .get(bet_id)
            .cloned()
            .ok_or(LedgerError::BetNotFound(bet_id))?;
        Ok(bet)
    }

    /// A bettor's bets in placement order, optionally filtered by status.
    pub fn get_bets_for_bettor(
        &self,
        bettor_handle: &BettorHandle,
        status: Option<BetStatus>,
    ) -> Vec<Bet> {
        let bet_ids = self
            .bettor_index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bettor_handle)
            .cloned()
            .unwrap_or_default();

        bet_ids
            .into_iter()
            .filter_map(|bet_id| self.get_bet(bet_id).ok())
            .filter(|bet| status.map_or(true, |status| bet.status == status))
            .collect()
    }

    pub fn bettor_stats(&self, bettor_handle: &BettorHandle) -> BettorStats {
        let mut stats = BettorStats::default();
        for bet in self.get_bets_for_bettor(bettor_handle, None) {
            stats.total += 1;
            match bet.status {
                BetStatus::Pending => stats.pending += 1,
                BetStatus::Won => stats.won += 1,
                BetStatus::Lost => stats.lost += 1,
            }
            if bet.claimed {
                stats.claimed += 1;
                stats.claimed_payout += bet.payout;
            }
        }

        let decided = stats.won + stats.lost;
        if decided > 0 {
            stats.win_rate = stats.won as f64 / decided as f64;
        }
        stats
    }

    /// Exceptions recorded while settling a market.
    pub fn settlement_exceptions(&self, market_id: MarketId) -> Result<Vec<SettlementException>> {
        let unit = self.store.unit(market_id)?;
        let exceptions = lock(&unit).exceptions.clone();
        Ok(exceptions)
    }

    fn market_of(&self, bet_id: BetId) -> Result<MarketId> {
        self.bet_index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&bet_id)
            .copied()
            .ok_or(LedgerError::BetNotFound(bet_id))
    }
}

/// Reveals are taken only between close and settlement, once per bet.
fn check_reveal_window(
    book: &mut MarketBook,
    bet_id: BetId,
    now: DateTime<Utc>,
) -> Result<Commitment> {
    book.market.sync(now);
    match book.market.status {
        MarketStatus::Open => return Err(LedgerError::NotYetClosed(book.market.id)),
        MarketStatus::Settled => return Err(LedgerError::AlreadySettled(book.market.id)),
        MarketStatus::Closed => {}
    }

    if book.reveals.contains_key(&bet_id) {
        return Err(LedgerError::RevealAlreadySubmitted(bet_id));
    }

    book.bets
        .get(bet_id)
        .map(|bet| bet.commitment)
        .ok_or(LedgerError::BetNotFound(bet_id))
}
