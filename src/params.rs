use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{SortitionError, SortitionResult};

/// Maker sortition draws three trials per ticket.
pub const MAKER_TRIALS: i32 = 3;

/// Consensus-critical sortition parameters. Every node in a network must run
/// with identical values; they are grouped here so deployments can load them
/// from the node configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SortitionParams {
    /// Look-back in blocks for the stake snapshot used by selection.
    #[serde(default = "default_sort_delay")]
    pub sort_delay: i64,
    /// Target number of block-maker candidates per round.
    #[serde(default = "default_maker_size")]
    pub maker_size: u32,
    /// Target committee size per voting slot.
    #[serde(default = "default_voter_size")]
    pub voter_size: u32,
    /// Number of committee slots rewarded per round; also the cap on voter
    /// selections per participant.
    #[serde(default = "default_reward_votes")]
    pub reward_votes: u32,
    /// Rolling window length for the online-rate estimate.
    #[serde(default = "default_diff_window")]
    pub diff_window: usize,
}

fn default_sort_delay() -> i64 {
    10
}

fn default_maker_size() -> u32 {
    15
}

fn default_voter_size() -> u32 {
    25
}

fn default_reward_votes() -> u32 {
    15
}

fn default_diff_window() -> usize {
    10
}

impl Default for SortitionParams {
    fn default() -> Self {
        Self {
            sort_delay: default_sort_delay(),
            maker_size: default_maker_size(),
            voter_size: default_voter_size(),
            reward_votes: default_reward_votes(),
            diff_window: default_diff_window(),
        }
    }
}

impl SortitionParams {
    pub fn load(path: &Path) -> SortitionResult<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|err| SortitionError::Config(format!("unable to parse params: {err}")))
    }

    pub fn save(&self, path: &Path) -> SortitionResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let encoded = toml::to_string_pretty(self)
            .map_err(|err| SortitionError::Config(format!("unable to encode params: {err}")))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    /// Height of the stake snapshot that selection at `height` reads from.
    pub fn snapshot_height(&self, height: i64) -> i64 {
        height - self.sort_delay
    }

    /// Upper bound (exclusive) on `num` for the given step.
    pub fn num_limit(&self, step: i32) -> i32 {
        if step == crate::types::STEP_MAKER {
            MAKER_TRIALS
        } else {
            self.reward_votes as i32
        }
    }
}
