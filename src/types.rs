//! Sortition message model and the canonical byte encodings that feed the
//! VRF and the sort hash. Every encoding in this module is consensus-binding:
//! all nodes must reproduce these bytes exactly.

use serde::{Deserialize, Serialize};

use crate::crypto::sha256d;
use crate::errors::{SortitionError, SortitionResult};

/// Participants are identified by the address string derived from their
/// compressed public key.
pub type Address = String;

/// Maker sortition step marker.
pub const STEP_MAKER: i32 = 0;
/// Voter sortition step marker.
pub const STEP_VOTER: i32 = 1;

/// Domain separator for the canonical VRF input encoding.
const VRF_INPUT_DOMAIN: &[u8] = b"sortition.vrf.input";

/// Tuple fed into the VRF: agreed seed plus the consensus position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfInput {
    pub seed: Vec<u8>,
    pub height: i64,
    pub round: i32,
    pub step: i32,
}

impl VrfInput {
    pub fn new(seed: &[u8; 32], height: i64, round: i32, step: i32) -> Self {
        Self {
            seed: seed.to_vec(),
            height,
            round,
            step,
        }
    }

    /// Deterministic serialization of the tuple: domain tag, length-prefixed
    /// seed, then the little-endian position fields in declaration order.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(VRF_INPUT_DOMAIN.len() + 4 + self.seed.len() + 16);
        data.extend_from_slice(VRF_INPUT_DOMAIN);
        data.extend_from_slice(&(self.seed.len() as u32).to_le_bytes());
        data.extend_from_slice(&self.seed);
        data.extend_from_slice(&self.height.to_le_bytes());
        data.extend_from_slice(&self.round.to_le_bytes());
        data.extend_from_slice(&self.step.to_le_bytes());
        data
    }
}

/// Proof envelope shared by every selection one participant produces for a
/// given (height, round, step).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HashProof {
    pub input: VrfInput,
    pub diff: f64,
    pub vrf_hash: Vec<u8>,
    pub vrf_proof: Vec<u8>,
    pub pubkey: Vec<u8>,
}

/// A selected ticket: the double-SHA256 sort hash plus the ticket index and
/// the trial/committee slot it was drawn for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortHash {
    pub hash: Vec<u8>,
    pub index: i64,
    pub num: i32,
}

/// Complete sortition message as gossiped between nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SortMsg {
    pub sort_hash: SortHash,
    pub proof: HashProof,
}

impl SortMsg {
    /// Wire encoding; re-serializing a decoded message is byte-identical.
    pub fn encode(&self) -> SortitionResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> SortitionResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Structural completeness check; field contents are validated by the
    /// verifier afterwards.
    pub fn ensure_complete(&self) -> SortitionResult<()> {
        if self.sort_hash.hash.len() != 32 {
            return Err(SortitionError::InvalidSortMsg(
                "sort hash must be 32 bytes".into(),
            ));
        }
        if self.proof.vrf_hash.len() != 32 {
            return Err(SortitionError::InvalidSortMsg(
                "vrf hash must be 32 bytes".into(),
            ));
        }
        if self.proof.vrf_proof.is_empty() {
            return Err(SortitionError::InvalidSortMsg("missing vrf proof".into()));
        }
        if self.proof.pubkey.is_empty() {
            return Err(SortitionError::InvalidSortMsg("missing public key".into()));
        }
        if self.proof.input.seed.len() != 32 {
            return Err(SortitionError::InvalidSortMsg(
                "seed must be 32 bytes".into(),
            ));
        }
        Ok(())
    }
}

/// Canonical string hashed into a sort hash:
/// `lowercase_hex(vrf_hash) + "+" + decimal(index) + "+" + decimal(num)`.
pub fn sort_hash_input(vrf_hash: &[u8], index: i64, num: i32) -> String {
    format!("{}+{}+{}", hex::encode(vrf_hash), index, num)
}

/// Sort hash for one trial of one ticket.
pub fn compute_sort_hash(vrf_hash: &[u8], index: i64, num: i32) -> [u8; 32] {
    sha256d(sort_hash_input(vrf_hash, index, num).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_msg() -> SortMsg {
        let input = VrfInput::new(&[7u8; 32], 120, 1, STEP_VOTER);
        let vrf_hash = vec![0xab; 32];
        let hash = compute_sort_hash(&vrf_hash, 4, 2);
        SortMsg {
            sort_hash: SortHash {
                hash: hash.to_vec(),
                index: 4,
                num: 2,
            },
            proof: HashProof {
                input,
                diff: 0.25,
                vrf_hash,
                vrf_proof: vec![1, 2, 3],
                pubkey: vec![2u8; 33],
            },
        }
    }

    #[test]
    fn canonical_input_is_deterministic_and_injective() {
        let base = VrfInput::new(&[1u8; 32], 55, 0, STEP_MAKER);
        assert_eq!(base.canonical_bytes(), base.canonical_bytes());

        let mut other_round = base.clone();
        other_round.round = 1;
        assert_ne!(base.canonical_bytes(), other_round.canonical_bytes());

        let mut other_step = base.clone();
        other_step.step = STEP_VOTER;
        assert_ne!(base.canonical_bytes(), other_step.canonical_bytes());
    }

    #[test]
    fn sort_hash_input_format_is_exact() {
        let vrf_hash = [0x0Fu8, 0xA0, 0xFF];
        assert_eq!(sort_hash_input(&vrf_hash, 12, 3), "0fa0ff+12+3");
        assert_eq!(sort_hash_input(&vrf_hash, 0, 0), "0fa0ff+0+0");
    }

    #[test]
    fn sort_hash_is_double_sha256_of_the_canonical_string() {
        let vrf_hash = [0x11u8; 32];
        let expected = sha256d(sort_hash_input(&vrf_hash, 9, 1).as_bytes());
        assert_eq!(compute_sort_hash(&vrf_hash, 9, 1), expected);
    }

    #[test]
    fn wire_round_trip_is_byte_identical() {
        let msg = sample_msg();
        let encoded = msg.encode().expect("encode");
        let decoded = SortMsg::decode(&encoded).expect("decode");
        assert_eq!(decoded, msg);
        assert_eq!(decoded.encode().expect("re-encode"), encoded);
    }

    #[test]
    fn incomplete_messages_are_rejected() {
        let mut msg = sample_msg();
        msg.proof.pubkey.clear();
        let err = msg.ensure_complete().unwrap_err();
        assert!(matches!(err, SortitionError::InvalidSortMsg(_)));

        let mut truncated = sample_msg();
        truncated.sort_hash.hash.truncate(31);
        assert!(truncated.ensure_complete().is_err());
    }
}
