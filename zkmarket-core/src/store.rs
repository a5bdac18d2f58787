//! # Market Store
//!
//! Index from [`MarketId`] to an isolated, separately locked [`MarketBook`].
//! The index lock is only held to look up or insert a unit; every market
//! operation then runs under that market's own mutex, so unrelated markets
//! never contend.

use crate::{
    bet::{Bet, BetBook, BetId},
    error::Result,
    market::{Market, MarketId, MarketParams, MarketView},
    settlement::{RevealedWager, SettlementException},
    LedgerError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// One consistency unit: a market together with everything recorded against it.
#[derive(Debug)]
pub struct MarketBook {
    pub market: Market,
    pub bets: BetBook,
    pub reveals: HashMap<BetId, RevealedWager>,
    pub exceptions: Vec<SettlementException>,
}

impl MarketBook {
    pub fn new(market: Market) -> Self {
        Self {
            market,
            bets: BetBook::default(),
            reveals: HashMap::new(),
            exceptions: Vec::new(),
        }
    }
}

/// Shared handle to a market's unit.
pub type MarketUnit = Arc<Mutex<MarketBook>>;

/// Lock a unit. Every critical section validates before mutating, so a
/// poisoned lock still guards consistent data.
pub fn lock(unit: &Mutex<MarketBook>) -> MutexGuard<'_, MarketBook> {
    unit.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Index {
    units: HashMap<MarketId, MarketUnit>,
    order: Vec<MarketId>,
}

/// Owner of all market records.
#[derive(Default)]
pub struct MarketStore {
    index: RwLock<Index>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a new market.
    pub fn create(
        &self,
        params: MarketParams,
        now: DateTime<Utc>,
        max_text_len: usize,
    ) -> Result<MarketId> {
        let market = Market::new(params, now, max_text_len)?;
        Ok(self.insert(MarketBook::new(market)))
    }

    /// Add a unit, keeping creation order.
    pub fn insert(&self, book: MarketBook) -> MarketId {
        let id = book.market.id;
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if index.units.insert(id, Arc::new(Mutex::new(book))).is_none() {
            index.order.push(id);
        }
        id
    }

    /// The unit for `id`, or `MarketNotFound`.
    pub fn unit(&self, id: MarketId) -> Result<MarketUnit> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .units
            .get(&id)
            .cloned()
            .ok_or(LedgerError::MarketNotFound(id))
    }

    /// Current view of a market, with the automatic close applied.
    pub fn get(&self, id: MarketId, now: DateTime<Utc>) -> Result<MarketView> {
        let unit = self.unit(id)?;
        let mut book = lock(&unit);
        book.market.sync(now);
        Ok(book.market.view())
    }

    /// Close a market. Idempotent; returns `true` if the status changed.
    pub fn transition_to_closed(&self, id: MarketId) -> Result<bool> {
        let unit = self.unit(id)?;
        let changed = lock(&unit).market.transition_to_closed();
        Ok(changed)
    }

    /// All units in creation order.
    pub fn units(&self) -> Vec<MarketUnit> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index
            .order
            .iter()
            .filter_map(|id| index.units.get(id).cloned())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }
}

/// Serializable copy of one market unit.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MarketRecord {
    pub market: Market,
    pub bets: Vec<Bet>,
    #[serde(default)]
    pub reveals: HashMap<BetId, RevealedWager>,
    #[serde(default)]
    pub exceptions: Vec<SettlementException>,
}

impl From<&MarketBook> for MarketRecord {
    fn from(book: &MarketBook) -> Self {
        Self {
            market: book.market.clone(),
            bets: book.bets.iter().cloned().collect(),
            reveals: book.reveals.clone(),
            exceptions: book.exceptions.clone(),
        }
    }
}

impl From<MarketRecord> for MarketBook {
    fn from(record: MarketRecord) -> Self {
        Self {
            market: record.market,
            bets: BetBook::from_bets(record.bets),
            reveals: record.reveals,
            exceptions: record.exceptions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::Outcome;
    use crate::market::MarketStatus;
    use crate::test_utils::*;
    use chrono::Duration;

    #[test]
    fn test_create_and_get() {
        let store = MarketStore::new();
        let id = store
            .create(market_params(Duration::hours(1)), test_now(), 100)
            .unwrap();

        let view = store.get(id, test_now()).unwrap();
        assert_eq!(view.id, id);
        assert_eq!(view.status, MarketStatus::Open);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_unknown_market() {
        let store = MarketStore::new();
        assert!(matches!(
            store.get(MarketId::new(), test_now()),
            Err(LedgerError::MarketNotFound(_))
        ));
    }

    #[test]
    fn test_get_applies_automatic_close() {
        let store = MarketStore::new();
        let id = store
            .create(market_params(Duration::hours(1)), test_now(), 100)
            .unwrap();

        let view = store.get(id, test_now() + Duration::hours(1)).unwrap();
        assert_eq!(view.status, MarketStatus::Closed);
    }

    #[test]
    fn test_transition_to_closed_idempotent() {
        let store = MarketStore::new();
        let id = store
            .create(market_params(Duration::hours(1)), test_now(), 100)
            .unwrap();

        assert!(store.transition_to_closed(id).unwrap());
        let first = store.get(id, test_now()).unwrap();
        assert!(!store.transition_to_closed(id).unwrap());
        assert_eq!(store.get(id, test_now()).unwrap(), first);
    }

    #[test]
    fn test_units_keep_creation_order() {
        let store = MarketStore::new();
        let ids: Vec<_> = (0..5)
            .map(|_| {
                store
                    .create(market_params(Duration::hours(1)), test_now(), 100)
                    .unwrap()
            })
            .collect();

        let listed: Vec<_> = store
            .units()
            .iter()
            .map(|unit| lock(unit).market.id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn test_record_conversion() {
        let mut book = MarketBook::new(open_market());
        let MarketBook { market, bets, .. } = &mut book;
        let bet_id = bets
            .place(market, handle("alice"), wager(Outcome::Yes, 3).0, test_now())
            .unwrap();

        let record = MarketRecord::from(&book);
        let json = serde_json::to_string(&record).unwrap();
        let restored = MarketBook::from(serde_json::from_str::<MarketRecord>(&json).unwrap());

        assert_eq!(restored.market.bet_count, 1);
        assert_eq!(restored.bets.get(bet_id), book.bets.get(bet_id));
    }
}
