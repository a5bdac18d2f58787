//! # Bet Ledger
//!
//! Bet records for a single market. A [`BetBook`] is always accessed together
//! with its [`Market`] under the market's lock, so the open-check, the
//! duplicate check, and the `bet_count` increment happen in one step.

use crate::{
    commitment::{Commitment, Decommitment},
    error::Result,
    market::{Market, MarketId},
    settlement::RevealedWager,
    utils::sha256_hash,
    LedgerError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

/// Opaque bet identifier
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct BetId(Uuid);

impl BetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for BetId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| LedgerError::InvalidEncoding(format!("bet id: {e}")))
    }
}

/// Pseudonymous stand-in for a wallet identity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct BettorHandle(String);

impl BettorHandle {
    /// Wrap a handle issued by the session provider.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Derive a handle from a wallet identity so the raw identity never
    /// reaches storage.
    pub fn derive(wallet_identity: &str, salt: &str) -> Self {
        Self(sha256_hash(&format!("{salt}:{wallet_identity}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map_or(self.0.len(), |(index, _)| index);
        &self.0[..end]
    }
}

impl fmt::Display for BettorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settlement status of a bet
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Pending => write!(f, "Pending"),
            BetStatus::Won => write!(f, "Won"),
            BetStatus::Lost => write!(f, "Lost"),
        }
    }
}

impl FromStr for BetStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BetStatus::Pending),
            "won" => Ok(BetStatus::Won),
            "lost" => Ok(BetStatus::Lost),
            _ => Err(LedgerError::InvalidEncoding(format!("unknown bet status: {s}"))),
        }
    }
}

/// Public record of a wager. Outcome and amount stay inside the commitment.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Bet {
    /// Unique bet identifier
    pub id: BetId,

    /// Market the bet was placed on
    pub market_id: MarketId,

    /// Pseudonymous bettor
    pub bettor_handle: BettorHandle,

    /// Commitment to (outcome, amount, blinding)
    pub commitment: Commitment,

    /// Settlement status
    pub status: BetStatus,

    /// Whether the payout has been issued
    pub claimed: bool,

    /// Payout owed to a winning bet, 0 otherwise
    pub payout: u64,

    /// Placement time
    pub placed_at: DateTime<Utc>,
}

impl Bet {
    /// Pending or won, and not yet claimed.
    pub fn is_outstanding(&self) -> bool {
        !self.claimed && matches!(self.status, BetStatus::Pending | BetStatus::Won)
    }
}

/// All bets of one market, in placement order.
#[derive(Clone, Debug, Default)]
pub struct BetBook {
    bets: Vec<Bet>,
    index: HashMap<BetId, usize>,
}

impl BetBook {
    /// Rebuild a book from stored records.
    pub fn from_bets(bets: Vec<Bet>) -> Self {
        let index = bets
            .iter()
            .enumerate()
            .map(|(position, bet)| (bet.id, position))
            .collect();
        Self { bets, index }
    }

    /// Accept a bet on `market`.
    ///
    /// Fails with `MarketNotOpen` unless the market is open and `now` is before
    /// its closing time, and with `DuplicateActiveBet` if the bettor already
    /// holds an outstanding bet here. Bumps the market's `bet_count`.
    pub fn place(
        &mut self,
        market: &mut Market,
        bettor_handle: BettorHandle,
        commitment: Commitment,
        now: DateTime<Utc>,
    ) -> Result<BetId> {
        market.sync(now);
        if !market.accepts_bets(now) {
            return Err(LedgerError::MarketNotOpen(market.id));
        }

        if self.outstanding_for(&bettor_handle).is_some() {
            return Err(LedgerError::DuplicateActiveBet(market.id));
        }

        let bet = Bet {
            id: BetId::new(),
            market_id: market.id,
            bettor_handle,
            commitment,
            status: BetStatus::Pending,
            claimed: false,
            payout: 0,
            placed_at: now,
        };
        let bet_id = bet.id;

        market.record_bet();
        self.index.insert(bet_id, self.bets.len());
        self.bets.push(bet);

        Ok(bet_id)
    }

    /// Classify a pending bet. Fails with `NotPending` otherwise.
    pub(crate) fn mark_outcome(&mut self, bet_id: BetId, won: bool) -> Result<()> {
        let bet = self.get_mut(bet_id)?;
        if bet.status != BetStatus::Pending {
            return Err(LedgerError::NotPending(bet_id));
        }

        bet.status = if won { BetStatus::Won } else { BetStatus::Lost };
        debug!(bet = %bet_id, status = %bet.status, "Bet classified");
        Ok(())
    }

    pub(crate) fn set_payout(&mut self, bet_id: BetId, payout: u64) -> Result<()> {
        self.get_mut(bet_id)?.payout = payout;
        Ok(())
    }

    /// Redeem a won bet.
    ///
    /// Checks status, the claimed flag, and the opening, then sets the flag and
    /// returns the payout. The opening must also agree with `revealed`, the
    /// wager the bet was settled on, since the payout was computed from it.
    /// Runs under the market lock, so two claims on the same bet cannot both
    /// get past the flag check.
    pub fn claim(
        &mut self,
        bet_id: BetId,
        decommitment: &Decommitment,
        revealed: Option<&RevealedWager>,
    ) -> Result<u64> {
        let bet = self.get_mut(bet_id)?;

        match bet.status {
            BetStatus::Won => {}
            BetStatus::Pending | BetStatus::Lost => return Err(LedgerError::NotWon(bet_id)),
        }
        if bet.claimed {
            return Err(LedgerError::AlreadyClaimed(bet_id));
        }
        let settled_on = revealed.is_some_and(|wager| {
            wager.outcome == decommitment.outcome && wager.amount == decommitment.amount
        });
        if !settled_on || !decommitment.opens(&bet.commitment) {
            return Err(LedgerError::CommitmentMismatch(bet_id));
        }

        bet.claimed = true;
        Ok(bet.payout)
    }

    pub fn get(&self, bet_id: BetId) -> Option<&Bet> {
        self.index.get(&bet_id).map(|&position| &self.bets[position])
    }

    fn get_mut(&mut self, bet_id: BetId) -> Result<&mut Bet> {
        let position = *self
            .index
            .get(&bet_id)
            .ok_or(LedgerError::BetNotFound(bet_id))?;
        Ok(&mut self.bets[position])
    }

    /// The bettor's outstanding bet, if any.
    pub fn outstanding_for(&self, bettor_handle: &BettorHandle) -> Option<&Bet> {
        self.bets
            .iter()
            .find(|bet| &bet.bettor_handle == bettor_handle && bet.is_outstanding())
    }

    /// Ids of all pending bets, in placement order.
    pub fn pending(&self) -> Vec<BetId> {
        self.bets
            .iter()
            .filter(|bet| bet.status == BetStatus::Pending)
            .map(|bet| bet.id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bet> {
        self.bets.iter()
    }

    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }
}
