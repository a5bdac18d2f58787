//! # Market Records
//!
//! This module holds the market record and its status state machine:
//!
//! ```text
//! Open ──(now >= closing_time | explicit close)──> Closed ──resolve──> Settled
//! ```
//!
//! `Settled` is terminal and the outcome is written exactly once, by
//! [`Market::resolve`]. Markets are never deleted.

use crate::{commitment::Outcome, error::Result, utils::sha256_hash, LedgerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default bound on question, description, and resolution source length.
pub const DEFAULT_MAX_TEXT_LEN: usize = 2_000;

/// Opaque market identifier
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MarketId(Uuid);

impl MarketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MarketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MarketId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| LedgerError::InvalidEncoding(format!("market id: {e}")))
    }
}

/// Market category
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Sports,
    Finance,
    Crypto,
    Politics,
    Entertainment,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Sports,
        Category::Finance,
        Category::Crypto,
        Category::Politics,
        Category::Entertainment,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Sports => "Sports",
            Category::Finance => "Finance",
            Category::Crypto => "Crypto",
            Category::Politics => "Politics",
            Category::Entertainment => "Entertainment",
        };
        f.write_str(name)
    }
}

impl FromStr for Category {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|category| category.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LedgerError::InvalidMarket(format!("unknown category: {s}")))
    }
}

/// Market lifecycle status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarketStatus {
    /// Accepting bets until the closing time
    Open,
    /// No further bets, outcome unknown
    Closed,
    /// Outcome fixed
    Settled,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStatus::Open => write!(f, "Open"),
            MarketStatus::Closed => write!(f, "Closed"),
            MarketStatus::Settled => write!(f, "Settled"),
        }
    }
}

impl FromStr for MarketStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(MarketStatus::Open),
            "closed" => Ok(MarketStatus::Closed),
            "settled" => Ok(MarketStatus::Settled),
            _ => Err(LedgerError::InvalidMarket(format!("unknown status: {s}"))),
        }
    }
}

/// Parameters for creating a market.
#[derive(Clone, Debug)]
pub struct MarketParams {
    pub question: String,
    pub description: String,
    pub category: Category,
    pub closing_time: DateTime<Utc>,
    pub resolution_source: String,
    /// Opaque creator handle; only a digest of it is retained
    pub creator: Option<String>,
}

/// A binary prediction market.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Market {
    /// Unique market identifier
    pub id: MarketId,

    /// Market question
    pub question: String,

    /// Longer description of the resolution criteria
    pub description: String,

    /// Market category
    pub category: Category,

    /// Bets are rejected at or after this instant
    pub closing_time: DateTime<Utc>,

    /// Where the outcome will be read from
    pub resolution_source: String,

    /// Lifecycle status
    pub status: MarketStatus,

    /// Winning outcome (if settled)
    pub outcome: Option<Outcome>,

    /// Number of accepted bets
    pub bet_count: u64,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// SHA-256 of the creator handle
    #[serde(default)]
    pub(crate) creator_digest: Option<String>,
}

impl Market {
    /// Validate `params` and build an `Open` market.
    ///
    /// Fails with `InvalidClosingTime` if the closing time is not after `now`,
    /// and with `InvalidMarket` for empty or oversized text fields.
    pub fn new(params: MarketParams, now: DateTime<Utc>, max_text_len: usize) -> Result<Self> {
        if params.closing_time <= now {
            return Err(LedgerError::InvalidClosingTime);
        }

        let question = validate_text("question", params.question, max_text_len)?;
        let description = validate_text("description", params.description, max_text_len)?;
        let resolution_source =
            validate_text("resolution source", params.resolution_source, max_text_len)?;

        Ok(Self {
            id: MarketId::new(),
            question,
            description,
            category: params.category,
            closing_time: params.closing_time,
            resolution_source,
            status: MarketStatus::Open,
            outcome: None,
            bet_count: 0,
            created_at: now,
            creator_digest: params.creator.as_deref().map(sha256_hash),
        })
    }

    /// Whether a bet placed at `now` would be accepted.
    pub fn accepts_bets(&self, now: DateTime<Utc>) -> bool {
        self.status == MarketStatus::Open && now < self.closing_time
    }

    /// Apply the automatic close once the closing time has passed.
    ///
    /// Returns `true` if the status changed.
    pub fn sync(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == MarketStatus::Open && now >= self.closing_time {
            self.status = MarketStatus::Closed;
            return true;
        }
        false
    }

    /// Close the market. A no-op on `Closed` and `Settled` markets.
    ///
    /// Returns `true` if the status changed.
    pub fn transition_to_closed(&mut self) -> bool {
        match self.status {
            MarketStatus::Open => {
                self.status = MarketStatus::Closed;
                true
            }
            MarketStatus::Closed | MarketStatus::Settled => false,
        }
    }

    /// Fix the outcome.
    ///
    /// Fails with `AlreadySettled` on a settled market and with `NotYetClosed`
    /// on an open one. Closing early goes through `transition_to_closed`, so
    /// bettors get a reveal window before the outcome is fixed.
    pub fn resolve(&mut self, outcome: Outcome, now: DateTime<Utc>) -> Result<()> {
        self.sync(now);

        match self.status {
            MarketStatus::Settled => return Err(LedgerError::AlreadySettled(self.id)),
            MarketStatus::Open => return Err(LedgerError::NotYetClosed(self.id)),
            MarketStatus::Closed => {}
        }

        self.status = MarketStatus::Settled;
        self.outcome = Some(outcome);
        Ok(())
    }

    /// Count an accepted bet.
    pub(crate) fn record_bet(&mut self) {
        self.bet_count += 1;
    }

    /// The public projection of this market.
    pub fn view(&self) -> MarketView {
        MarketView {
            id: self.id,
            question: self.question.clone(),
            description: self.description.clone(),
            category: self.category,
            closing_time: self.closing_time,
            resolution_source: self.resolution_source.clone(),
            status: self.status,
            outcome: self.outcome,
            bet_count: self.bet_count,
            created_at: self.created_at,
        }
    }
}

fn validate_text(field: &str, value: String, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidMarket(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(LedgerError::InvalidMarket(format!(
            "{field} exceeds {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// What callers see of a market. The creator is never part of it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MarketView {
    pub id: MarketId,
    pub question: String,
    pub description: String,
    pub category: Category,
    pub closing_time: DateTime<Utc>,
    pub resolution_source: String,
    pub status: MarketStatus,
    pub outcome: Option<Outcome>,
    pub bet_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Listing filter. Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct MarketFilter {
    pub category: Option<Category>,
    pub status: Option<MarketStatus>,
    /// Case-insensitive substring of the question
    pub search: Option<String>,
}

impl MarketFilter {
    pub fn matches(&self, market: &Market) -> bool {
        if self.category.is_some_and(|category| category != market.category) {
            return false;
        }
        if self.status.is_some_and(|status| status != market.status) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(search) if !search.is_empty() => market
                .question
                .to_lowercase()
                .contains(&search.to_lowercase()),
            _ => true,
        }
    }
}
