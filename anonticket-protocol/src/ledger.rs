/*!
Double-spend detection.

Each verifier keeps a [`SpendLedger`] with one [`SpendSlot`] per tag slot it validates. A slot holds
the transcripts of the two most recent presentations. Every presentation is recorded, the first
one included, and compared with the one before it: a tag shown twice carries the same commitment
`Q` under two different nonces, and its spend responses `E1 = x + r1 * k` and `E2 = x + r2 * k`
give away
```text
k = (E1 - E2) / (r1 - r2),    x = E1 - r1 * k,
```
from which the verifier recomputes the cheating user's pseudonym `xi^x`.
*/

use crate::types::*;
use anonticket_crypto::arith;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a verifier keeps from one presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendTranscript {
    /// The tag commitment `Q`.
    #[serde(with = "SerializeElement")]
    pub commitment: G1Affine,
    /// The spend response `E`.
    #[serde(with = "SerializeElement")]
    pub response: Scalar,
    /// The tag component `P`.
    #[serde(with = "SerializeElement")]
    pub encryption: G1Affine,
    /// The tag hash `s_V`.
    #[serde(with = "SerializeElement")]
    pub tag_hash: Scalar,
    /// The verifier's nonce `r`.
    #[serde(with = "SerializeElement")]
    pub nonce: Scalar,
}

/// A double spend caught in `slot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleSpend {
    /// The slot the tag was presented in.
    pub slot: String,
    /// The recovered pseudonym; absent if both presentations used the same nonce.
    #[serde(with = "SerializeElement")]
    pub pseudonym: Option<G1Affine>,
}

/// The result of validating a presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    /// The presentation is valid and fresh.
    Valid,
    /// The presentation is valid, but its tag was already spent.
    DoubleSpendDetected(DoubleSpend),
}

impl ValidationOutcome {
    /// Whether a double spend was detected.
    pub fn is_double_spend(&self) -> bool {
        matches!(self, ValidationOutcome::DoubleSpendDetected(_))
    }
}

/// The last two presentations seen in a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendSlot {
    current: Option<SpendTranscript>,
    previous: Option<SpendTranscript>,
}

impl SpendSlot {
    /// Record `transcript` in `slot` and compare it with the presentation before it.
    fn record(
        &mut self,
        slot: &str,
        transcript: SpendTranscript,
        params: &GroupParameters,
    ) -> Option<DoubleSpend> {
        self.previous = self.current.replace(transcript);
        let previous = self.previous?;
        if previous.commitment != transcript.commitment || previous.response == transcript.response
        {
            return None;
        }
        Some(DoubleSpend {
            slot: slot.to_string(),
            pseudonym: recover_pseudonym(&previous, &transcript, params),
        })
    }

    /// The most recent presentation.
    pub fn current(&self) -> Option<&SpendTranscript> {
        self.current.as_ref()
    }

    /// The presentation before the most recent one.
    pub fn previous(&self) -> Option<&SpendTranscript> {
        self.previous.as_ref()
    }
}

fn recover_pseudonym(
    first: &SpendTranscript,
    second: &SpendTranscript,
    params: &GroupParameters,
) -> Option<G1Affine> {
    let inverse = arith::invert_scalar(&(first.nonce - second.nonce)).ok()?;
    let opening = (first.response - second.response) * inverse;
    let secret = first.response - first.nonce * opening;
    Some((params.xi() * secret).into())
}

/// Spend transcripts of a verifier, per slot.
#[derive(Debug, Clone, Default)]
pub struct SpendLedger {
    slots: HashMap<String, SpendSlot>,
}

impl SpendLedger {
    /// Record a presentation in `slot`.
    pub fn record(
        &mut self,
        slot: &str,
        transcript: SpendTranscript,
        params: &GroupParameters,
    ) -> ValidationOutcome {
        match self
            .slots
            .entry(slot.to_string())
            .or_default()
            .record(slot, transcript, params)
        {
            None => ValidationOutcome::Valid,
            Some(double_spend) => {
                log::warn!("double spend detected in slot {}", slot);
                ValidationOutcome::DoubleSpendDetected(double_spend)
            }
        }
    }

    /// The transcripts kept for `slot`.
    pub fn slot(&self, slot: &str) -> Option<&SpendSlot> {
        self.slots.get(slot)
    }

    /// Forget every transcript.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
