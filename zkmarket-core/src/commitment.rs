//! # Wager Commitments
//!
//! A wager is the secret triple (outcome, amount, blinding factor). The ledger
//! only ever stores the commitment to it; the bettor keeps the
//! [`Decommitment`] and opens it at claim time.
//!
//! The wire form of an opening is fixed at 41 bytes:
//!
//! ```text
//! outcome (1 byte, 0x01 = Yes, 0x00 = No) || amount (u64 BE) || blinding (32 bytes)
//! ```
//!
//! and the commitment is `SHA-256(domain || wire form)`.

use crate::{error::Result, LedgerError};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Domain separator for wager commitments.
const COMMITMENT_DOMAIN: &[u8] = b"ZKMARKET_WAGER_COMMIT_V1";

/// Smallest accepted wager, in wager units.
pub const MIN_WAGER: u64 = 1;

/// Largest accepted wager, in wager units.
pub const MAX_WAGER: u64 = 10_000;

/// Length of a blinding factor in bytes.
pub const BLINDING_LEN: usize = 32;

/// Length of a commitment in bytes.
pub const COMMITMENT_LEN: usize = 32;

/// Length of an encoded decommitment in bytes.
pub const DECOMMITMENT_LEN: usize = 1 + 8 + BLINDING_LEN;

/// Binary market outcome.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// Single-byte wire tag.
    pub const fn to_byte(self) -> u8 {
        match self {
            Outcome::Yes => 0x01,
            Outcome::No => 0x00,
        }
    }

    /// Parse the single-byte wire tag.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(Outcome::Yes),
            0x00 => Ok(Outcome::No),
            other => Err(LedgerError::InvalidOutcome(format!("0x{other:02x}"))),
        }
    }

    /// The other side of the market.
    pub const fn opposite(self) -> Self {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Yes => write!(f, "Yes"),
            Outcome::No => write!(f, "No"),
        }
    }
}

impl FromStr for Outcome {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Outcome::Yes),
            "no" => Ok(Outcome::No),
            _ => Err(LedgerError::InvalidOutcome(s.to_string())),
        }
    }
}

/// Check a wager amount against the accepted range.
pub fn validate_amount(amount: u64) -> Result<()> {
    if !(MIN_WAGER..=MAX_WAGER).contains(&amount) {
        return Err(LedgerError::InvalidAmount {
            amount,
            min: MIN_WAGER,
            max: MAX_WAGER,
        });
    }
    Ok(())
}

/// Random value that hides the wager inside its commitment.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BlindingFactor([u8; BLINDING_LEN]);

impl BlindingFactor {
    pub const fn from_bytes(bytes: [u8; BLINDING_LEN]) -> Self {
        Self(bytes)
    }

    /// Draw a fresh blinding factor from the thread RNG.
    pub fn random() -> Self {
        let mut rng = thread_rng();
        Self(rng.gen())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; BLINDING_LEN] = bytes.try_into().map_err(|_| {
            LedgerError::InvalidEncoding(format!(
                "blinding factor must be {BLINDING_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_slice(&hex::decode(s)?)
    }

    pub fn as_bytes(&self) -> &[u8; BLINDING_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlindingFactor(<redacted>)")
    }
}

/// Binding, hiding commitment to a wager. Serialized as lowercase hex.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(into = "String", try_from = "String")]
pub struct Commitment([u8; COMMITMENT_LEN]);

impl Commitment {
    pub const fn from_bytes(bytes: [u8; COMMITMENT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())?;
        let bytes: [u8; COMMITMENT_LEN] = bytes.as_slice().try_into().map_err(|_| {
            LedgerError::InvalidEncoding(format!(
                "commitment must be {COMMITMENT_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; COMMITMENT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", &self.to_hex()[..16])
    }
}

impl From<Commitment> for String {
    fn from(commitment: Commitment) -> Self {
        commitment.to_hex()
    }
}

impl TryFrom<String> for Commitment {
    type Error = LedgerError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_hex(&s)
    }
}

fn encode_wager(outcome: Outcome, amount: u64, blinding: &BlindingFactor) -> [u8; DECOMMITMENT_LEN] {
    let mut bytes = [0u8; DECOMMITMENT_LEN];
    bytes[0] = outcome.to_byte();
    bytes[1..9].copy_from_slice(&amount.to_be_bytes());
    bytes[9..].copy_from_slice(blinding.as_bytes());
    bytes
}

/// Commit to a wager.
///
/// Deterministic in its inputs. Fails with `InvalidAmount` when the amount is
/// outside `MIN_WAGER..=MAX_WAGER`.
pub fn commit(outcome: Outcome, amount: u64, blinding: &BlindingFactor) -> Result<Commitment> {
    validate_amount(amount)?;

    let mut hasher = Sha256::new();
    hasher.update(COMMITMENT_DOMAIN);
    hasher.update(encode_wager(outcome, amount, blinding));
    Ok(Commitment(hasher.finalize().into()))
}

/// Recompute the commitment for an opening and compare.
pub fn verify(
    commitment: &Commitment,
    outcome: Outcome,
    amount: u64,
    blinding: &BlindingFactor,
) -> bool {
    commit(outcome, amount, blinding)
        .map(|computed| computed == *commitment)
        .unwrap_or(false)
}

/// Commit to a wager with a freshly drawn blinding factor.
///
/// Returns the public commitment and the secret opening the bettor must keep.
pub fn commit_random(outcome: Outcome, amount: u64) -> Result<(Commitment, Decommitment)> {
    let decommitment = Decommitment::new(outcome, amount, BlindingFactor::random())?;
    let commitment = decommitment.commitment()?;
    Ok((commitment, decommitment))
}

/// The secret opening of a commitment. Held by the bettor, never by the ledger.
#[derive(Clone, PartialEq, Eq)]
pub struct Decommitment {
    pub outcome: Outcome,
    pub amount: u64,
    pub blinding: BlindingFactor,
}

impl Decommitment {
    pub fn new(outcome: Outcome, amount: u64, blinding: BlindingFactor) -> Result<Self> {
        validate_amount(amount)?;
        Ok(Self {
            outcome,
            amount,
            blinding,
        })
    }

    /// The commitment this opening produces.
    pub fn commitment(&self) -> Result<Commitment> {
        commit(self.outcome, self.amount, &self.blinding)
    }

    /// Whether this opening matches `commitment`.
    pub fn opens(&self, commitment: &Commitment) -> bool {
        verify(commitment, self.outcome, self.amount, &self.blinding)
    }

    pub fn encode(&self) -> [u8; DECOMMITMENT_LEN] {
        encode_wager(self.outcome, self.amount, &self.blinding)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != DECOMMITMENT_LEN {
            return Err(LedgerError::InvalidEncoding(format!(
                "decommitment must be {DECOMMITMENT_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let outcome = Outcome::from_byte(bytes[0])?;
        let mut amount = [0u8; 8];
        amount.copy_from_slice(&bytes[1..9]);
        let blinding = BlindingFactor::from_slice(&bytes[9..])?;

        Self::new(outcome, u64::from_be_bytes(amount), blinding)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::decode(&hex::decode(s.trim())?)
    }

    /// Display bucket for the wager size.
    pub fn level(&self) -> WagerLevel {
        WagerLevel::for_amount(self.amount)
    }
}

impl fmt::Debug for Decommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decommitment")
            .field("outcome", &"<redacted>")
            .field("amount", &"<redacted>")
            .field("blinding", &self.blinding)
            .finish()
    }
}

/// Coarse wager size, shown in place of the amount itself.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WagerLevel {
    Conservative,
    Moderate,
    Confident,
    Maximum,
}

impl WagerLevel {
    /// Bucket an amount by its share of `MAX_WAGER`.
    pub fn for_amount(amount: u64) -> Self {
        let percent = amount.min(MAX_WAGER) * 100 / MAX_WAGER;
        match percent {
            0..=24 => WagerLevel::Conservative,
            25..=49 => WagerLevel::Moderate,
            50..=74 => WagerLevel::Confident,
            _ => WagerLevel::Maximum,
        }
    }
}

impl fmt::Display for WagerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WagerLevel::Conservative => "Conservative",
            WagerLevel::Moderate => "Moderate",
            WagerLevel::Confident => "Confident",
            WagerLevel::Maximum => "Maximum",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn blinding(seed: u8) -> BlindingFactor {
        BlindingFactor::from_bytes([seed; BLINDING_LEN])
    }

    #[test]
    fn test_commit_is_deterministic() {
        let a = commit(Outcome::Yes, 500, &blinding(7)).unwrap();
        let b = commit(Outcome::Yes, 500, &blinding(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_commit_rejects_out_of_range_amounts() {
        for amount in [0, MAX_WAGER + 1, u64::MAX] {
            let err = commit(Outcome::No, amount, &blinding(1)).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount { .. }), "{amount}");
        }
        assert!(commit(Outcome::No, MIN_WAGER, &blinding(1)).is_ok());
        assert!(commit(Outcome::No, MAX_WAGER, &blinding(1)).is_ok());
    }

    #[test]
    fn test_outcome_parsing() {
        assert_eq!("YES".parse::<Outcome>().unwrap(), Outcome::Yes);
        assert_eq!(" no ".parse::<Outcome>().unwrap(), Outcome::No);
        assert!(matches!(
            "maybe".parse::<Outcome>(),
            Err(LedgerError::InvalidOutcome(_))
        ));
        assert!(matches!(
            Outcome::from_byte(0x02),
            Err(LedgerError::InvalidOutcome(_))
        ));
    }

    #[test]
    fn test_decommitment_encoding() {
        let decommitment = Decommitment::new(Outcome::Yes, 250, blinding(9)).unwrap();
        let bytes = decommitment.encode();
        assert_eq!(bytes.len(), DECOMMITMENT_LEN);
        assert_eq!(bytes[0], 0x01);
        assert_eq!(&bytes[1..9], &250u64.to_be_bytes());

        let decoded = Decommitment::from_hex(&decommitment.to_hex()).unwrap();
        assert_eq!(decoded, decommitment);
    }

    #[test]
    fn test_decommitment_decode_rejects_malformed_input() {
        assert!(matches!(
            Decommitment::decode(&[0u8; 10]),
            Err(LedgerError::InvalidEncoding(_))
        ));

        let mut bad_outcome = Decommitment::new(Outcome::No, 5, blinding(2)).unwrap().encode();
        bad_outcome[0] = 0x07;
        assert!(matches!(
            Decommitment::decode(&bad_outcome),
            Err(LedgerError::InvalidOutcome(_))
        ));

        let mut bad_amount = bad_outcome;
        bad_amount[0] = 0x00;
        bad_amount[1..9].copy_from_slice(&0u64.to_be_bytes());
        assert!(matches!(
            Decommitment::decode(&bad_amount),
            Err(LedgerError::InvalidAmount { .. })
        ));

        assert!(matches!(
            Decommitment::from_hex("zz"),
            Err(LedgerError::Hex(_))
        ));
    }

    #[test]
    fn test_commitment_hex_and_serde() {
        let commitment = commit(Outcome::No, 42, &blinding(3)).unwrap();
        assert_eq!(Commitment::from_hex(&commitment.to_hex()).unwrap(), commitment);

        let json = serde_json::to_string(&commitment).unwrap();
        assert_eq!(json, format!("\"{}\"", commitment.to_hex()));
        let back: Commitment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, commitment);

        assert!(matches!(
            Commitment::from_hex("abcd"),
            Err(LedgerError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_commit_random_opens() {
        let (commitment, decommitment) = commit_random(Outcome::Yes, 100).unwrap();
        assert!(decommitment.opens(&commitment));
        let (other, _) = commit_random(Outcome::Yes, 100).unwrap();
        assert_ne!(commitment, other, "fresh blinding should give a fresh commitment");
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let decommitment = Decommitment::new(Outcome::Yes, 9_999, blinding(0xab)).unwrap();
        let debug = format!("{decommitment:?}");
        assert!(!debug.contains("9999"));
        assert!(!debug.contains("abab"));
    }

    #[test]
    fn test_wager_levels() {
        assert_eq!(WagerLevel::for_amount(1), WagerLevel::Conservative);
        assert_eq!(WagerLevel::for_amount(2_499), WagerLevel::Conservative);
        assert_eq!(WagerLevel::for_amount(2_500), WagerLevel::Moderate);
        assert_eq!(WagerLevel::for_amount(5_000), WagerLevel::Confident);
        assert_eq!(WagerLevel::for_amount(7_500), WagerLevel::Maximum);
        assert_eq!(WagerLevel::for_amount(MAX_WAGER), WagerLevel::Maximum);
    }

    fn outcome_strategy() -> impl Strategy<Value = Outcome> {
        prop_oneof![Just(Outcome::Yes), Just(Outcome::No)]
    }

    proptest! {
        #[test]
        fn prop_commit_then_verify(
            outcome in outcome_strategy(),
            amount in MIN_WAGER..=MAX_WAGER,
            seed in any::<[u8; 32]>(),
        ) {
            let blinding = BlindingFactor::from_bytes(seed);
            let commitment = commit(outcome, amount, &blinding).unwrap();
            prop_assert!(verify(&commitment, outcome, amount, &blinding));
        }

        #[test]
        fn prop_altered_opening_fails(
            outcome in outcome_strategy(),
            amount in MIN_WAGER..MAX_WAGER,
            seed in any::<[u8; 32]>(),
            flip in 0usize..BLINDING_LEN,
        ) {
            let blinding = BlindingFactor::from_bytes(seed);
            let commitment = commit(outcome, amount, &blinding).unwrap();

            prop_assert!(!verify(&commitment, outcome.opposite(), amount, &blinding));
            prop_assert!(!verify(&commitment, outcome, amount + 1, &blinding));

            let mut altered = seed;
            altered[flip] ^= 0x01;
            prop_assert!(!verify(&commitment, outcome, amount, &BlindingFactor::from_bytes(altered)));
        }
    }
}
