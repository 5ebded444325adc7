//! Validation of received sortition messages against the delayed stake
//! snapshot and the declared difficulty.

use std::sync::Arc;

use tracing::debug;

use crate::crypto::address_from_public_key;
use crate::difficulty::meets_difficulty;
use crate::errors::{SortitionError, SortitionResult};
use crate::interfaces::DepositReader;
use crate::params::SortitionParams;
use crate::types::{compute_sort_hash, SortMsg, VrfInput};
use crate::vrf;

/// Verifier for sortition messages received from the network.
///
/// The declared difficulty inside a message is only checked against the sort
/// hash; whether that declaration is within policy is a decision for the
/// round protocol, which keeps cryptographic validity separate from policy
/// validity.
pub struct SortVerifier {
    params: SortitionParams,
    deposits: Arc<dyn DepositReader>,
}

impl SortVerifier {
    pub fn new(params: SortitionParams, deposits: Arc<dyn DepositReader>) -> Self {
        Self { params, deposits }
    }

    pub fn params(&self) -> &SortitionParams {
        &self.params
    }

    /// Full validation of `msg` for the given consensus position.
    ///
    /// Heights inside the genesis window (`height <= sort_delay`) are
    /// accepted unconditionally because no delayed snapshot exists yet.
    pub fn verify_sort(
        &self,
        height: i64,
        step: i32,
        seed: &[u8; 32],
        msg: &SortMsg,
    ) -> SortitionResult<()> {
        if height <= self.params.sort_delay {
            return Ok(());
        }
        msg.ensure_complete()?;

        let address = address_from_public_key(&msg.proof.pubkey);
        let deposit = self.deposits.deposit(&address)?;
        let count = deposit.effective_count(height, self.params.sort_delay);
        let index = msg.sort_hash.index;
        if index < 0 || index as u64 >= count {
            debug!(height, index, count, "sortition index outside snapshot");
            return Err(SortitionError::InvalidIndex { index, count });
        }

        let num = msg.sort_hash.num;
        let max = self.params.num_limit(step);
        if num < 0 || num >= max {
            return Err(SortitionError::InvalidNum { num, max });
        }

        let input = VrfInput::new(seed, height, msg.proof.input.round, step);
        vrf::verify(
            &msg.proof.pubkey,
            &input.canonical_bytes(),
            &msg.proof.vrf_proof,
            &msg.proof.vrf_hash,
        )?;

        let expected = compute_sort_hash(&msg.proof.vrf_hash, index, num);
        if expected[..] != msg.sort_hash.hash[..] {
            return Err(SortitionError::HashMismatch);
        }

        if !meets_difficulty(&msg.sort_hash.hash, msg.proof.diff) {
            debug!(
                height,
                step,
                diff = msg.proof.diff,
                "sort hash above declared difficulty"
            );
            return Err(SortitionError::DiffExceeded {
                diff: msg.proof.diff,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;
    use crate::difficulty::DifficultyController;
    use crate::engine::Sorter;
    use crate::interfaces::{DepositSnapshot, TicketHolder};
    use crate::types::STEP_VOTER;

    struct SnapshotDeposits {
        snapshot: DepositSnapshot,
    }

    impl DepositReader for SnapshotDeposits {
        fn deposit(&self, _address: &str) -> SortitionResult<DepositSnapshot> {
            Ok(self.snapshot)
        }

        fn total_tickets(&self, _height: i64) -> u64 {
            self.snapshot.count
        }
    }

    struct LocalTickets {
        key: crate::crypto::SigningKey,
        count: u64,
    }

    impl TicketHolder for LocalTickets {
        fn signing_key(&self) -> Option<crate::crypto::SigningKey> {
            Some(self.key.clone())
        }

        fn ticket_count(&self) -> u64 {
            self.count
        }
    }

    fn harness(count: u64) -> (Sorter, SortVerifier) {
        let params = SortitionParams::default();
        let deposits = Arc::new(SnapshotDeposits {
            snapshot: DepositSnapshot {
                count,
                pre_count: 0,
                close_height: -1,
            },
        });
        let sorter = Sorter::new(
            params.clone(),
            Arc::new(LocalTickets {
                key: generate_keypair(),
                count,
            }),
            deposits.clone(),
            Arc::new(DifficultyController::new(params.clone())),
        );
        let verifier = SortVerifier::new(params, deposits);
        (sorter, verifier)
    }

    #[test]
    fn produced_voter_messages_verify() {
        let (sorter, verifier) = harness(10);
        let seed = [0u8; 32];
        let msgs = sorter.voter_sort(&seed, 100, 0, 1, 1.0);
        assert!(!msgs.is_empty());
        for msg in &msgs {
            verifier
                .verify_sort(100, STEP_VOTER, &seed, msg)
                .expect("voter message verifies");
        }
    }

    #[test]
    fn produced_maker_message_verifies() {
        let (sorter, verifier) = harness(200);
        let seed = [1u8; 32];
        let msgs = sorter.maker_sort(&seed, 150, 2);
        for msg in &msgs {
            verifier
                .verify_sort(150, crate::types::STEP_MAKER, &seed, msg)
                .expect("maker message verifies");
        }
    }

    #[test]
    fn genesis_window_accepts_anything() {
        let (sorter, verifier) = harness(5);
        let seed = [2u8; 32];
        let msgs = sorter.voter_sort(&seed, 100, 0, 0, 1.0);
        let mut msg = msgs[0].clone();
        msg.sort_hash.hash[0] ^= 0xff;
        verifier
            .verify_sort(verifier.params().sort_delay, STEP_VOTER, &seed, &msg)
            .expect("genesis window accepts");
    }

    #[test]
    fn tampered_sort_hash_is_a_hash_mismatch() {
        let (sorter, verifier) = harness(10);
        let seed = [3u8; 32];
        let msgs = sorter.voter_sort(&seed, 100, 0, 1, 1.0);
        let mut msg = msgs[0].clone();
        msg.sort_hash.hash[5] ^= 0x01;
        let err = verifier.verify_sort(100, STEP_VOTER, &seed, &msg).unwrap_err();
        assert!(matches!(err, SortitionError::HashMismatch));
    }

    #[test]
    fn index_outside_snapshot_is_rejected() {
        let (sorter, verifier) = harness(10);
        let seed = [4u8; 32];
        let msgs = sorter.voter_sort(&seed, 100, 0, 1, 1.0);
        let mut msg = msgs[0].clone();
        msg.sort_hash.index = 10;
        let err = verifier.verify_sort(100, STEP_VOTER, &seed, &msg).unwrap_err();
        assert!(matches!(
            err,
            SortitionError::InvalidIndex { index: 10, count: 10 }
        ));
    }

    #[test]
    fn num_outside_range_is_rejected() {
        let (sorter, verifier) = harness(10);
        let seed = [5u8; 32];
        let msgs = sorter.voter_sort(&seed, 100, 0, 1, 1.0);
        let mut msg = msgs[0].clone();
        msg.sort_hash.num = verifier.params().reward_votes as i32;
        let err = verifier.verify_sort(100, STEP_VOTER, &seed, &msg).unwrap_err();
        assert!(matches!(err, SortitionError::InvalidNum { .. }));

        // Maker trials stop at three.
        let maker_err = verifier
            .verify_sort(100, crate::types::STEP_MAKER, &seed, &{
                let mut m = msgs[0].clone();
                m.sort_hash.num = 3;
                m
            })
            .unwrap_err();
        assert!(matches!(maker_err, SortitionError::InvalidNum { max: 3, .. }));
    }

    #[test]
    fn wrong_seed_fails_vrf_verification() {
        let (sorter, verifier) = harness(10);
        let seed = [6u8; 32];
        let msgs = sorter.voter_sort(&seed, 100, 0, 1, 1.0);
        let err = verifier
            .verify_sort(100, STEP_VOTER, &[7u8; 32], &msgs[0])
            .unwrap_err();
        assert!(matches!(err, SortitionError::VrfFailed(_)));
    }

    #[test]
    fn inflated_declared_difficulty_still_passes_the_crypto_check() {
        // The verifier trusts the declared diff; policy bounds live outside.
        let (sorter, verifier) = harness(10);
        let seed = [8u8; 32];
        let msgs = sorter.voter_sort(&seed, 100, 0, 1, 1.0);
        let mut msg = msgs[0].clone();
        msg.proof.diff = 2.0;
        verifier
            .verify_sort(100, STEP_VOTER, &seed, &msg)
            .expect("inflated diff passes cryptographic checks");
    }

    #[test]
    fn understated_difficulty_is_rejected() {
        let (sorter, verifier) = harness(10);
        let seed = [9u8; 32];
        let msgs = sorter.voter_sort(&seed, 100, 0, 1, 1.0);
        let mut msg = msgs[0].clone();
        msg.proof.diff = f64::MIN_POSITIVE;
        let err = verifier.verify_sort(100, STEP_VOTER, &seed, &msg).unwrap_err();
        assert!(matches!(err, SortitionError::DiffExceeded { .. }));
    }

    #[test]
    fn recently_closed_deposit_falls_back_to_pre_count() {
        let params = SortitionParams::default();
        let key = generate_keypair();
        let producing = Arc::new(SnapshotDeposits {
            snapshot: DepositSnapshot {
                count: 10,
                pre_count: 0,
                close_height: -1,
            },
        });
        let sorter = Sorter::new(
            params.clone(),
            Arc::new(LocalTickets {
                key: key.clone(),
                count: 10,
            }),
            producing,
            Arc::new(DifficultyController::new(params.clone())),
        );
        let seed = [10u8; 32];
        let msgs = sorter.voter_sort(&seed, 100, 0, 1, 1.0);
        let high_index = msgs
            .iter()
            .max_by_key(|m| m.sort_hash.index)
            .expect("selection")
            .clone();

        // The deposit closed within the delay window; only the pre-close
        // count of 2 tickets is admissible.
        let closing = Arc::new(SnapshotDeposits {
            snapshot: DepositSnapshot {
                count: 10,
                pre_count: 2,
                close_height: 95,
            },
        });
        let verifier = SortVerifier::new(params, closing);
        if high_index.sort_hash.index >= 2 {
            let err = verifier
                .verify_sort(100, STEP_VOTER, &seed, &high_index)
                .unwrap_err();
            assert!(matches!(err, SortitionError::InvalidIndex { .. }));
        }
    }
}
