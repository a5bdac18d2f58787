//! Ledger configuration.

use crate::{error::Result, market::DEFAULT_MAX_TEXT_LEN, LedgerError};
use serde::{Deserialize, Serialize};

/// Who may create markets.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreatorPolicy {
    /// Anyone, including anonymous callers
    #[default]
    Open,
    /// Only the listed creator handles
    Allowlist(Vec<String>),
}

impl CreatorPolicy {
    /// Check a creator against the policy.
    pub fn authorize(&self, creator: Option<&str>) -> Result<()> {
        match (self, creator) {
            (CreatorPolicy::Open, _) => Ok(()),
            (CreatorPolicy::Allowlist(allowed), Some(creator))
                if allowed.iter().any(|handle| handle == creator) =>
            {
                Ok(())
            }
            (CreatorPolicy::Allowlist(_), _) => Err(LedgerError::CreatorNotAllowed),
        }
    }
}

/// Ledger-wide settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Market creation policy
    pub creator_policy: CreatorPolicy,

    /// Upper bound on market text fields, in characters
    pub max_text_len: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            creator_policy: CreatorPolicy::Open,
            max_text_len: DEFAULT_MAX_TEXT_LEN,
        }
    }
}

impl LedgerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
