//! Producer side of sortition: turns the local stake into maker and voter
//! selections for a (height, round).

use std::sync::Arc;

use tracing::{debug, info};

use crate::difficulty::{meets_difficulty, DifficultyController};
use crate::interfaces::{DepositReader, TicketHolder};
use crate::params::{SortitionParams, MAKER_TRIALS};
use crate::types::{
    compute_sort_hash, HashProof, SortHash, SortMsg, VrfInput, STEP_MAKER, STEP_VOTER,
};
use crate::vrf;

/// Local sortition engine. Selection never fails: missing keys, zero stake,
/// or a VRF failure all degrade to an empty result for the round.
pub struct Sorter {
    params: SortitionParams,
    tickets: Arc<dyn TicketHolder>,
    deposits: Arc<dyn DepositReader>,
    difficulty: Arc<DifficultyController>,
}

impl Sorter {
    pub fn new(
        params: SortitionParams,
        tickets: Arc<dyn TicketHolder>,
        deposits: Arc<dyn DepositReader>,
        difficulty: Arc<DifficultyController>,
    ) -> Self {
        Self {
            params,
            tickets,
            deposits,
            difficulty,
        }
    }

    pub fn params(&self) -> &SortitionParams {
        &self.params
    }

    /// Maker difficulty for `height` from the controller and the delayed
    /// total ticket weight.
    pub fn maker_diff(&self, height: i64) -> f64 {
        let total = self
            .deposits
            .total_tickets(self.params.snapshot_height(height));
        self.difficulty.difficulty(STEP_MAKER, total)
    }

    /// Base difficulty for voter sortition at `height`.
    ///
    /// This is the maker-target controller output, identical to
    /// [`maker_diff`](Self::maker_diff); [`voter_sort`](Self::voter_sort)
    /// widens it by `voter_size / maker_size` itself. Feeding the
    /// controller's voter-target output here would apply that widening
    /// twice.
    pub fn voter_diff(&self, height: i64) -> f64 {
        self.maker_diff(height)
    }

    /// Voter sortition for committee slot `num`: tests every local ticket
    /// against the widened threshold and returns at most `reward_votes`
    /// selections, smallest hashes first.
    ///
    /// `diff` is the maker-target base difficulty, normally
    /// [`voter_diff`](Self::voter_diff). The committee widening by
    /// `voter_size / maker_size` is applied in here; callers must not
    /// pre-scale the value they pass.
    pub fn voter_sort(
        &self,
        seed: &[u8; 32],
        height: i64,
        round: i32,
        num: i32,
        diff: f64,
    ) -> Vec<SortMsg> {
        let count = self.tickets.ticket_count();
        let Some(key) = self.tickets.signing_key() else {
            debug!(height, round, "voter sortition skipped: no signing key");
            return Vec::new();
        };
        if count == 0 {
            return Vec::new();
        }

        // The voter committee target is larger than the maker target, so the
        // threshold widens by the same ratio on top of the controller diff.
        let diff = diff * (self.params.voter_size as f64 / self.params.maker_size as f64);

        let input = VrfInput::new(seed, height, round, STEP_VOTER);
        let Ok((vrf_hash, vrf_proof)) = vrf::evaluate(&key, &input.canonical_bytes()) else {
            debug!(height, round, "voter sortition skipped: vrf evaluation failed");
            return Vec::new();
        };
        let proof = HashProof {
            input,
            diff,
            vrf_hash: vrf_hash.to_vec(),
            vrf_proof,
            pubkey: key.public_bytes().to_vec(),
        };

        let mut msgs = Vec::new();
        for index in 0..count as i64 {
            let hash = compute_sort_hash(&vrf_hash, index, num);
            if !meets_difficulty(&hash, diff) {
                continue;
            }
            msgs.push(SortMsg {
                sort_hash: SortHash {
                    hash: hash.to_vec(),
                    index,
                    num,
                },
                proof: proof.clone(),
            });
        }

        if msgs.len() > self.params.reward_votes as usize {
            msgs.sort_by(|a, b| a.sort_hash.hash.cmp(&b.sort_hash.hash));
            msgs.truncate(self.params.reward_votes as usize);
        }
        info!(
            height,
            round,
            num,
            count,
            selected = msgs.len(),
            "voter sortition"
        );
        msgs
    }

    /// Maker sortition: three trials per ticket, keeping only the globally
    /// smallest hash below the threshold. Returns zero or one message.
    pub fn maker_sort(&self, seed: &[u8; 32], height: i64, round: i32) -> Vec<SortMsg> {
        let count = self.tickets.ticket_count();
        let Some(key) = self.tickets.signing_key() else {
            debug!(height, round, "maker sortition skipped: no signing key");
            return Vec::new();
        };
        if count == 0 {
            return Vec::new();
        }

        let diff = self.maker_diff(height);
        let input = VrfInput::new(seed, height, round, STEP_MAKER);
        let Ok((vrf_hash, vrf_proof)) = vrf::evaluate(&key, &input.canonical_bytes()) else {
            debug!(height, round, "maker sortition skipped: vrf evaluation failed");
            return Vec::new();
        };
        let proof = HashProof {
            input,
            diff,
            vrf_hash: vrf_hash.to_vec(),
            vrf_proof,
            pubkey: key.public_bytes().to_vec(),
        };

        let mut min_sort: Option<SortMsg> = None;
        for num in 0..MAKER_TRIALS {
            for index in 0..count as i64 {
                let hash = compute_sort_hash(&vrf_hash, index, num);
                if !meets_difficulty(&hash, diff) {
                    continue;
                }
                let replace = match &min_sort {
                    Some(current) => hash[..] < current.sort_hash.hash[..],
                    None => true,
                };
                if replace {
                    min_sort = Some(SortMsg {
                        sort_hash: SortHash {
                            hash: hash.to_vec(),
                            index,
                            num,
                        },
                        proof: proof.clone(),
                    });
                }
            }
        }

        info!(
            height,
            round,
            count,
            diff,
            selected = min_sort.is_some(),
            "maker sortition"
        );
        min_sort.into_iter().collect()
    }
}
