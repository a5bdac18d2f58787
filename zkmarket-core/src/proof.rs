//! Boundary to the external proof system.
//!
//! The ledger never proves or verifies anything itself; it asks a
//! [`ProofVerifier`] for a yes/no answer before entering a critical section.

use crate::{
    commitment::{self, BlindingFactor, Commitment},
    settlement::Reveal,
};

/// Attests that commitments are well formed and that reveals match them.
pub trait ProofVerifier: Send + Sync {
    /// Called before a bet carrying `commitment` is placed.
    fn attest_commitment(&self, commitment: &Commitment) -> bool;

    /// Called before `reveal` is accepted for the bet holding `commitment`.
    fn attest_reveal(&self, commitment: &Commitment, reveal: &Reveal) -> bool;
}

/// Accepts every attestation. The resolver vouches for reveals out of band.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrustingVerifier;

impl ProofVerifier for TrustingVerifier {
    fn attest_commitment(&self, _commitment: &Commitment) -> bool {
        true
    }

    fn attest_reveal(&self, _commitment: &Commitment, _reveal: &Reveal) -> bool {
        true
    }
}

/// Checks reveals by opening the commitment directly: the reveal's proof bytes
/// are the blinding factor.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpeningVerifier;

impl ProofVerifier for OpeningVerifier {
    fn attest_commitment(&self, _commitment: &Commitment) -> bool {
        true
    }

    fn attest_reveal(&self, commitment: &Commitment, reveal: &Reveal) -> bool {
        BlindingFactor::from_slice(&reveal.proof)
            .map(|blinding| commitment::verify(commitment, reveal.outcome, reveal.amount, &blinding))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{commit_random, Outcome};

    #[test]
    fn test_opening_verifier() {
        let (commitment, decommitment) = commit_random(Outcome::Yes, 40).unwrap();
        let verifier = OpeningVerifier;

        let honest = Reveal {
            outcome: Outcome::Yes,
            amount: 40,
            proof: decommitment.blinding.as_bytes().to_vec(),
        };
        assert!(verifier.attest_reveal(&commitment, &honest));

        let flipped = Reveal {
            outcome: Outcome::No,
            ..honest.clone()
        };
        assert!(!verifier.attest_reveal(&commitment, &flipped));

        let truncated = Reveal {
            proof: vec![0u8; 4],
            ..honest
        };
        assert!(!verifier.attest_reveal(&commitment, &truncated));
    }

    #[test]
    fn test_trusting_verifier() {
        let (commitment, _) = commit_random(Outcome::No, 1).unwrap();
        let reveal = Reveal {
            outcome: Outcome::Yes,
            amount: 9,
            proof: Vec::new(),
        };
        assert!(TrustingVerifier.attest_commitment(&commitment));
        assert!(TrustingVerifier.attest_reveal(&commitment, &reveal));
    }
}
