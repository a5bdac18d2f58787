//! Error types for zkmarket-core

use crate::{bet::BetId, market::MarketId};
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Coarse classification of a [`LedgerError`].
///
/// Callers branch on the kind rather than on individual variants: validation
/// errors are never worth retrying, state conflicts only after re-reading the
/// current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape or range, rejected before any mutation
    Validation,
    /// The request conflicts with the current state of a market or bet
    StateConflict,
    /// Unknown market or bet id
    NotFound,
    /// Resolution attempted while the market is still open
    NotYetClosed,
    /// Serialization and encoding plumbing
    Internal,
}

/// Error types for ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Wager amount outside the accepted range
    #[error("Invalid amount: {amount} (must be between {min} and {max})")]
    InvalidAmount { amount: u64, min: u64, max: u64 },

    /// Outcome is not exactly Yes or No
    #[error("Invalid outcome: {0}")]
    InvalidOutcome(String),

    /// Closing time is not in the future
    #[error("Invalid closing time: must be after the current time")]
    InvalidClosingTime,

    /// Market text fields failed validation
    #[error("Invalid market: {0}")]
    InvalidMarket(String),

    /// Malformed commitment or decommitment bytes
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// The proof capability refused to attest
    #[error("Proof rejected: {0}")]
    ProofRejected(String),

    /// Creator policy does not allow this creator
    #[error("Creator not allowed to create markets")]
    CreatorNotAllowed,

    /// Market is not accepting bets
    #[error("Market {0} is not open for bets")]
    MarketNotOpen(MarketId),

    /// Bettor already holds an outstanding bet on the market
    #[error("Bettor already has an active bet on market {0}")]
    DuplicateActiveBet(MarketId),

    /// Market outcome is already fixed
    #[error("Market {0} is already settled")]
    AlreadySettled(MarketId),

    /// Bet has already been classified
    #[error("Bet {0} is not pending")]
    NotPending(BetId),

    /// Payout for the bet was already issued
    #[error("Bet {0} has already been claimed")]
    AlreadyClaimed(BetId),

    /// Bet did not win
    #[error("Bet {0} has not won")]
    NotWon(BetId),

    /// Decommitment does not open the stored commitment
    #[error("Decommitment does not match the commitment of bet {0}")]
    CommitmentMismatch(BetId),

    /// A reveal was already recorded for the bet
    #[error("Reveal already submitted for bet {0}")]
    RevealAlreadySubmitted(BetId),

    /// Unknown market
    #[error("Market not found: {0}")]
    MarketNotFound(MarketId),

    /// Unknown bet
    #[error("Bet not found: {0}")]
    BetNotFound(BetId),

    /// Market is still open
    #[error("Market {0} has not closed yet")]
    NotYetClosed(MarketId),

    /// Hex decoding errors
    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Serde JSON errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount { .. }
            | Self::InvalidOutcome(_)
            | Self::InvalidClosingTime
            | Self::InvalidMarket(_)
            | Self::InvalidEncoding(_)
            | Self::ProofRejected(_)
            | Self::CreatorNotAllowed => ErrorKind::Validation,
            Self::MarketNotOpen(_)
            | Self::DuplicateActiveBet(_)
            | Self::AlreadySettled(_)
            | Self::NotPending(_)
            | Self::AlreadyClaimed(_)
            | Self::NotWon(_)
            | Self::CommitmentMismatch(_)
            | Self::RevealAlreadySubmitted(_) => ErrorKind::StateConflict,
            Self::MarketNotFound(_) | Self::BetNotFound(_) => ErrorKind::NotFound,
            Self::NotYetClosed(_) => ErrorKind::NotYetClosed,
            Self::Hex(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinguishable() {
        let market_id = MarketId::new();
        let bet_id = BetId::new();

        assert_eq!(
            LedgerError::InvalidAmount { amount: 0, min: 1, max: 10 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(LedgerError::InvalidClosingTime.kind(), ErrorKind::Validation);
        assert_eq!(
            LedgerError::DuplicateActiveBet(market_id).kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(LedgerError::AlreadyClaimed(bet_id).kind(), ErrorKind::StateConflict);
        assert_eq!(LedgerError::BetNotFound(bet_id).kind(), ErrorKind::NotFound);
        assert_eq!(LedgerError::NotYetClosed(market_id).kind(), ErrorKind::NotYetClosed);
    }

    #[test]
    fn test_error_messages() {
        let err = LedgerError::InvalidAmount { amount: 20_000, min: 1, max: 10_000 };
        assert_eq!(
            err.to_string(),
            "Invalid amount: 20000 (must be between 1 and 10000)"
        );
    }
}
