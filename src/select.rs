//! Deterministic aggregation of verified sortition messages: the winner for
//! any slot is the message with the lexicographically smallest sort hash,
//! independent of the order candidates arrived in.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::errors::SortitionResult;
use crate::interfaces::SeedSource;
use crate::params::{SortitionParams, MAKER_TRIALS};
use crate::types::{SortMsg, STEP_MAKER};
use crate::verify::SortVerifier;

/// Collected sortition messages keyed by height, round, then trial/slot.
pub type SortTable = HashMap<i64, HashMap<i32, HashMap<i32, Vec<SortMsg>>>>;

/// Smallest message by byte order of the sort hash. Ties (identical bytes)
/// keep the first candidate, which is stable because equal hashes imply an
/// identical message body in practice.
pub fn min_sort_msg<'a, I>(candidates: I) -> Option<&'a SortMsg>
where
    I: IntoIterator<Item = &'a SortMsg>,
{
    candidates
        .into_iter()
        .min_by(|a, b| a.sort_hash.hash.cmp(&b.sort_hash.hash))
}

/// Outcome of maker selection for one (height, round).
#[derive(Clone, Debug, Default)]
pub struct MakerSelection {
    /// Minimum verified candidate per maker trial.
    pub per_num: Vec<Option<SortMsg>>,
    /// Global minimum across all trials; its pubkey identifies the proposer.
    pub winner: Option<SortMsg>,
}

impl MakerSelection {
    pub fn winner_pubkey(&self) -> Option<&[u8]> {
        self.winner.as_ref().map(|msg| msg.proof.pubkey.as_slice())
    }
}

/// Aggregator over collected sortition messages. Re-verifies each candidate
/// before it can win, so an unvalidated table cannot smuggle in a proposer.
pub struct SortSelector {
    verifier: SortVerifier,
    seeds: Arc<dyn SeedSource>,
}

impl SortSelector {
    pub fn new(verifier: SortVerifier, seeds: Arc<dyn SeedSource>) -> Self {
        Self { verifier, seeds }
    }

    pub fn params(&self) -> &SortitionParams {
        self.verifier.params()
    }

    /// Deterministic, idempotent maker selection for `(height, round)`:
    /// per-trial minima over the verified candidates plus the global winner.
    pub fn maker_selection(
        &self,
        table: &SortTable,
        height: i64,
        round: i32,
    ) -> SortitionResult<MakerSelection> {
        let seed = self
            .seeds
            .sort_seed(self.params().snapshot_height(height))?;

        let mut selection = MakerSelection {
            per_num: vec![None; MAKER_TRIALS as usize],
            winner: None,
        };
        let Some(by_num) = table.get(&height).and_then(|rounds| rounds.get(&round)) else {
            return Ok(selection);
        };

        for num in 0..MAKER_TRIALS {
            let Some(candidates) = by_num.get(&num) else {
                continue;
            };
            let verified = candidates.iter().filter(|msg| {
                match self.verifier.verify_sort(height, STEP_MAKER, &seed, msg) {
                    Ok(()) => true,
                    Err(err) => {
                        debug!(height, round, num, %err, "dropping maker candidate");
                        false
                    }
                }
            });
            selection.per_num[num as usize] = min_sort_msg(verified).cloned();
        }

        selection.winner =
            min_sort_msg(selection.per_num.iter().flatten()).cloned();
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HashProof, SortHash, VrfInput, STEP_VOTER};

    fn msg_with_hash(first_byte: u8, index: i64) -> SortMsg {
        SortMsg {
            sort_hash: SortHash {
                hash: {
                    let mut hash = vec![0u8; 32];
                    hash[0] = first_byte;
                    hash
                },
                index,
                num: 0,
            },
            proof: HashProof {
                input: VrfInput::new(&[0u8; 32], 1, 0, STEP_VOTER),
                diff: 1.0,
                vrf_hash: vec![0u8; 32],
                vrf_proof: vec![1],
                pubkey: vec![first_byte; 33],
            },
        }
    }

    #[test]
    fn min_selection_ignores_insertion_order() {
        let a = msg_with_hash(0x10, 0);
        let b = msg_with_hash(0x05, 1);
        let c = msg_with_hash(0x20, 2);

        let forward = vec![a.clone(), b.clone(), c.clone()];
        let backward = vec![c, a, b.clone()];

        let from_forward = min_sort_msg(&forward).expect("winner");
        let from_backward = min_sort_msg(&backward).expect("winner");
        assert_eq!(from_forward.sort_hash.hash, b.sort_hash.hash);
        assert_eq!(from_forward.sort_hash.hash, from_backward.sort_hash.hash);
    }

    #[test]
    fn min_selection_of_empty_set_is_none() {
        let candidates: Vec<SortMsg> = Vec::new();
        assert!(min_sort_msg(&candidates).is_none());
    }

    #[test]
    fn repeated_selection_is_idempotent() {
        let msgs: Vec<SortMsg> = (0..8).map(|i| msg_with_hash(0xf0 - i, i as i64)).collect();
        let first = min_sort_msg(&msgs).expect("winner").clone();
        let second = min_sort_msg(&msgs).expect("winner").clone();
        assert_eq!(first, second);
    }
}
