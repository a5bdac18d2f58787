//! # Settlement
//!
//! Fixes a market's outcome, classifies every pending bet, and computes
//! pari-mutuel payouts. The status transition is all-or-nothing; per-bet
//! problems are recorded as [`SettlementException`]s and never abort the run.

use crate::{
    bet::{BetBook, BetId},
    commitment::{validate_amount, Outcome},
    error::Result,
    market::{Market, MarketId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// A bettor's disclosure of which side a bet backed and for how much.
///
/// Held by the bettor until the market closes; distinct from the public
/// [`Bet`](crate::bet::Bet) record. `proof` is opaque to the ledger and is
/// checked by a [`ProofVerifier`](crate::proof::ProofVerifier).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Reveal {
    pub outcome: Outcome,
    pub amount: u64,
    pub proof: Vec<u8>,
}

/// What the ledger keeps of an attested reveal. The proof is dropped once it
/// has been checked, so stored state never holds enough to open a commitment.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealedWager {
    pub outcome: Outcome,
    pub amount: u64,
}

impl From<&Reveal> for RevealedWager {
    fn from(reveal: &Reveal) -> Self {
        Self {
            outcome: reveal.outcome,
            amount: reveal.amount,
        }
    }
}

/// Why a bet was settled as lost by default.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ExceptionReason {
    /// No reveal was submitted before settlement
    MissingReveal,
    /// The revealed stake is outside the wager range
    AmountOutOfRange(u64),
    /// The bet could not be classified
    Unclassifiable(String),
}

impl fmt::Display for ExceptionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionReason::MissingReveal => write!(f, "no reveal submitted"),
            ExceptionReason::AmountOutOfRange(amount) => {
                write!(f, "revealed amount {amount} out of range")
            }
            ExceptionReason::Unclassifiable(reason) => write!(f, "unclassifiable: {reason}"),
        }
    }
}

/// A bet that needs manual review after settlement.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SettlementException {
    pub bet_id: BetId,
    pub reason: ExceptionReason,
}

/// Summary of one settlement run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SettlementReport {
    pub market_id: MarketId,
    pub outcome: Outcome,
    pub winners: Vec<BetId>,
    pub losers: Vec<BetId>,
    pub winning_pool: u64,
    pub losing_pool: u64,
    pub exceptions: Vec<SettlementException>,
}

/// Payout of a winning stake: the stake back plus its pro-rata share of the
/// losing pool, rounded down.
pub fn calculate_payout(stake: u64, winning_pool: u64, losing_pool: u64) -> u64 {
    if winning_pool == 0 {
        return 0;
    }

    let share = u128::from(stake) * u128::from(losing_pool) / u128::from(winning_pool);
    stake.saturating_add(u64::try_from(share).unwrap_or(u64::MAX))
}

/// Settle `market` with `outcome`.
///
/// 1. Resolve the market (fails fast if already settled or still open).
/// 2. Snapshot the pending bets.
/// 3. Classify each against its reveal. Bets without a usable reveal are
///    marked lost and reported as exceptions.
/// 4. Pay winners from the losing pool. No winners means no payouts.
pub fn settle(
    market: &mut Market,
    bets: &mut BetBook,
    reveals: &HashMap<BetId, RevealedWager>,
    outcome: Outcome,
    now: DateTime<Utc>,
) -> Result<SettlementReport> {
    market.resolve(outcome, now)?;

    let mut report = SettlementReport {
        market_id: market.id,
        outcome,
        winners: Vec::new(),
        losers: Vec::new(),
        winning_pool: 0,
        losing_pool: 0,
        exceptions: Vec::new(),
    };
    let mut stakes = Vec::new();

    for bet_id in bets.pending() {
        let (won, stake) = match reveals.get(&bet_id) {
            None => {
                report.exceptions.push(SettlementException {
                    bet_id,
                    reason: ExceptionReason::MissingReveal,
                });
                (false, None)
            }
            Some(reveal) if validate_amount(reveal.amount).is_err() => {
                report.exceptions.push(SettlementException {
                    bet_id,
                    reason: ExceptionReason::AmountOutOfRange(reveal.amount),
                });
                (false, None)
            }
            Some(reveal) => (reveal.outcome == outcome, Some(reveal.amount)),
        };

        if let Err(e) = bets.mark_outcome(bet_id, won) {
            report.exceptions.push(SettlementException {
                bet_id,
                reason: ExceptionReason::Unclassifiable(e.to_string()),
            });
            continue;
        }

        if won {
            report.winners.push(bet_id);
        } else {
            report.losers.push(bet_id);
        }

        match (won, stake) {
            (true, Some(stake)) => {
                report.winning_pool += stake;
                stakes.push((bet_id, stake));
            }
            (false, Some(stake)) => report.losing_pool += stake,
            (_, None) => {}
        }
    }

    for (bet_id, stake) in stakes {
        let payout = calculate_payout(stake, report.winning_pool, report.losing_pool);
        if let Err(e) = bets.set_payout(bet_id, payout) {
            report.exceptions.push(SettlementException {
                bet_id,
                reason: ExceptionReason::Unclassifiable(e.to_string()),
            });
        }
    }

    for exception in &report.exceptions {
        warn!(
            market = %market.id,
            bet = %exception.bet_id,
            reason = %exception.reason,
            "Settlement exception recorded"
        );
    }
    info!(
        market = %market.id,
        outcome = %outcome,
        winners = report.winners.len(),
        losers = report.losers.len(),
        "Market settled"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bet::BetStatus;
    use crate::market::MarketStatus;
    use crate::test_utils::*;
    use crate::LedgerError;
    use chrono::Duration;

    fn reveal(outcome: Outcome, amount: u64) -> RevealedWager {
        RevealedWager { outcome, amount }
    }

    fn after_close() -> DateTime<Utc> {
        test_now() + Duration::hours(2)
    }

    #[test]
    fn test_calculate_payout() {
        assert_eq!(calculate_payout(10, 10, 5), 15);
        assert_eq!(calculate_payout(100, 150, 150), 200);
        assert_eq!(calculate_payout(50, 150, 150), 100);
        assert_eq!(calculate_payout(10, 0, 5), 0);
        assert_eq!(calculate_payout(10, 10, 0), 10);
        assert_eq!(calculate_payout(1, 3, 1), 1);
    }

    #[test]
    fn test_settle_two_sided_market() {
        let mut market = open_market();
        let mut book = BetBook::default();
        let yes = book
            .place(&mut market, handle("alice"), wager(Outcome::Yes, 10).0, test_now())
            .unwrap();
        let no = book
            .place(&mut market, handle("bob"), wager(Outcome::No, 5).0, test_now())
            .unwrap();
        let reveals = HashMap::from([
            (yes, reveal(Outcome::Yes, 10)),
            (no, reveal(Outcome::No, 5)),
        ]);

        let report = settle(&mut market, &mut book, &reveals, Outcome::Yes, after_close())
            .unwrap();

        assert_eq!(market.status, MarketStatus::Settled);
        assert_eq!(report.winners, vec![yes]);
        assert_eq!(report.losers, vec![no]);
        assert_eq!(report.winning_pool, 10);
        assert_eq!(report.losing_pool, 5);
        assert!(report.exceptions.is_empty());

        let won = book.get(yes).unwrap();
        assert_eq!(won.status, BetStatus::Won);
        assert_eq!(won.payout, 15);
        let lost = book.get(no).unwrap();
        assert_eq!(lost.status, BetStatus::Lost);
        assert_eq!(lost.payout, 0);
    }

    #[test]
    fn test_settle_without_winners() {
        let mut market = open_market();
        let mut book = BetBook::default();
        let a = book
            .place(&mut market, handle("alice"), wager(Outcome::No, 10).0, test_now())
            .unwrap();
        let b = book
            .place(&mut market, handle("bob"), wager(Outcome::No, 20).0, test_now())
            .unwrap();
        let reveals = HashMap::from([(a, reveal(Outcome::No, 10)), (b, reveal(Outcome::No, 20))]);

        let report = settle(&mut market, &mut book, &reveals, Outcome::Yes, after_close())
            .unwrap();

        assert!(report.winners.is_empty());
        assert_eq!(report.losing_pool, 30);
        assert!(book.iter().all(|bet| bet.status == BetStatus::Lost && bet.payout == 0));
    }

    #[test]
    fn test_missing_and_malformed_reveals_do_not_abort() {
        let mut market = open_market();
        let mut book = BetBook::default();
        let silent = book
            .place(&mut market, handle("alice"), wager(Outcome::Yes, 10).0, test_now())
            .unwrap();
        let malformed = book
            .place(&mut market, handle("bob"), wager(Outcome::Yes, 10).0, test_now())
            .unwrap();
        let honest = book
            .place(&mut market, handle("carol"), wager(Outcome::Yes, 30).0, test_now())
            .unwrap();
        let reveals = HashMap::from([
            (malformed, reveal(Outcome::Yes, 0)),
            (honest, reveal(Outcome::Yes, 30)),
        ]);

        let report = settle(&mut market, &mut book, &reveals, Outcome::Yes, after_close())
            .unwrap();

        assert_eq!(report.winners, vec![honest]);
        assert_eq!(report.losers, vec![silent, malformed]);
        assert_eq!(
            report.exceptions,
            vec![
                SettlementException {
                    bet_id: silent,
                    reason: ExceptionReason::MissingReveal,
                },
                SettlementException {
                    bet_id: malformed,
                    reason: ExceptionReason::AmountOutOfRange(0),
                },
            ]
        );
        // Stakes of unrevealed bets are unknown and stay out of both pools.
        assert_eq!(report.losing_pool, 0);
        assert_eq!(book.get(honest).unwrap().payout, 30);
    }

    #[test]
    fn test_settle_fails_fast() {
        let mut market = open_market();
        let mut book = BetBook::default();
        let bet_id = book
            .place(&mut market, handle("alice"), wager(Outcome::Yes, 10).0, test_now())
            .unwrap();

        let err = settle(&mut market, &mut book, &HashMap::new(), Outcome::Yes, test_now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotYetClosed(_)));
        assert_eq!(book.get(bet_id).unwrap().status, BetStatus::Pending);

        settle(&mut market, &mut book, &HashMap::new(), Outcome::Yes, after_close())
            .unwrap();
        let err = settle(&mut market, &mut book, &HashMap::new(), Outcome::No, after_close())
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadySettled(_)));
        assert_eq!(market.outcome, Some(Outcome::Yes));
    }

    #[test]
    fn test_pro_rata_split_between_winners() {
        let mut market = open_market();
        let mut book = BetBook::default();
        let big = book
            .place(&mut market, handle("alice"), wager(Outcome::No, 300).0, test_now())
            .unwrap();
        let small = book
            .place(&mut market, handle("bob"), wager(Outcome::No, 100).0, test_now())
            .unwrap();
        let loser = book
            .place(&mut market, handle("carol"), wager(Outcome::Yes, 200).0, test_now())
            .unwrap();
        let reveals = HashMap::from([
            (big, reveal(Outcome::No, 300)),
            (small, reveal(Outcome::No, 100)),
            (loser, reveal(Outcome::Yes, 200)),
        ]);

        settle(&mut market, &mut book, &reveals, Outcome::No, after_close()).unwrap();

        assert_eq!(book.get(big).unwrap().payout, 450);
        assert_eq!(book.get(small).unwrap().payout, 150);
        assert_eq!(book.get(loser).unwrap().payout, 0);
    }
}
