//! # Utility Functions
//!
//! Hashing and timestamp helpers shared by the ledger and the CLI.

use crate::{error::Result, LedgerError};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Hash a message using SHA256
pub fn sha256_hash(message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    let hash = hasher.finalize();
    hex::encode(hash)
}

/// Format timestamp as human-readable string
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Parse a timestamp given as Unix seconds or RFC 3339
pub fn parse_timestamp(timestamp_str: &str) -> Result<DateTime<Utc>> {
    let trimmed = timestamp_str.trim();

    if let Ok(seconds) = trimmed.parse::<i64>() {
        return DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| LedgerError::InvalidMarket(format!("Invalid timestamp: {trimmed}")));
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| LedgerError::InvalidMarket(format!("Invalid timestamp: {trimmed}")))
}
