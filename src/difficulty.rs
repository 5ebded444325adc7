//! Difficulty arithmetic for sortition.
//!
//! Two concerns live here: the consensus-critical threshold test comparing a
//! sort hash against a floating-point difficulty, and the rolling online-rate
//! controller that widens the maker threshold when participation drops.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use parking_lot::Mutex;

use crate::params::SortitionParams;
use crate::types::STEP_MAKER;

/// Exact test of `hash / 2^256 <= diff`.
///
/// The hash is read as a 256-bit big-endian integer `y` and the IEEE-754
/// double is decomposed exactly into `m * 2^e`, so the comparison reduces to
/// `y <= floor(m * 2^(e + 256))` over arbitrary-precision integers. No
/// float rounding is involved, which keeps the ordering identical on every
/// platform.
pub fn meets_difficulty(hash: &[u8], diff: f64) -> bool {
    if !diff.is_finite() || diff <= 0.0 {
        return false;
    }
    if diff >= 1.0 {
        return true;
    }

    let bits = diff.to_bits();
    let raw_exponent = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = if raw_exponent == 0 {
        (fraction, -1074i64)
    } else {
        (fraction | (1u64 << 52), raw_exponent - 1075)
    };

    let y = BigUint::from_bytes_be(hash);
    let shift = exponent + 256;
    let threshold = if shift >= 0 {
        BigUint::from(mantissa) << shift as usize
    } else {
        BigUint::from(mantissa) >> (-shift) as usize
    };
    y <= threshold
}

/// Rolling estimate of how much of the committee is actually voting, fed by
/// observed vote counts per height. Shared between the engine and the host's
/// vote accounting, hence the internal mutex.
#[derive(Debug)]
pub struct DifficultyController {
    params: SortitionParams,
    window: Mutex<BTreeMap<i64, u64>>,
}

impl DifficultyController {
    pub fn new(params: SortitionParams) -> Self {
        Self {
            params,
            window: Mutex::new(BTreeMap::new()),
        }
    }

    /// Records the number of committee votes observed at `height`. The
    /// window keeps only the most recent `diff_window` heights.
    pub fn record_votes(&self, height: i64, votes: u64) {
        let mut window = self.window.lock();
        window.insert(height, votes);
        while window.len() > self.params.diff_window {
            let oldest = *window.keys().next().expect("window not empty");
            window.remove(&oldest);
        }
    }

    /// Online rate in `(0, 1]`. Until the window fills the estimate is 1.0;
    /// afterwards it is the observed vote total over the ideal vote total,
    /// floored at one vote per window so the ratio stays positive.
    pub fn online_rate(&self) -> f64 {
        let window = self.window.lock();
        if window.len() < self.params.diff_window {
            return 1.0;
        }
        let ideal = (window.len() as u64 * self.params.reward_votes as u64).max(1);
        let observed: u64 = window.values().sum();
        let rate = observed.max(1) as f64 / ideal as f64;
        rate.min(1.0)
    }

    /// Difficulty for the given step at a height whose delayed snapshot holds
    /// `total_weight` tickets: `target / total_weight / online_rate`, clamped
    /// into `(0, 1]`.
    ///
    /// The voter-step output is the full committee threshold, already
    /// widened relative to the maker target. Voter sortition takes the
    /// maker-step value as its base and widens it itself (see
    /// [`Sorter::voter_diff`](crate::engine::Sorter::voter_diff)), so the
    /// voter-step output is never fed back into the engine.
    pub fn difficulty(&self, step: i32, total_weight: u64) -> f64 {
        if total_weight == 0 {
            return 1.0;
        }
        let target = if step == STEP_MAKER {
            self.params.maker_size
        } else {
            self.params.voter_size
        };
        let diff = target as f64 / total_weight as f64 / self.online_rate();
        diff.min(1.0)
    }

    #[cfg(test)]
    fn window_len(&self) -> usize {
        self.window.lock().len()
    }
}
