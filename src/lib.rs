//! Cryptographic sortition core for the proof-of-stake consensus engine.
//!
//! At every block height and round each staking participant privately and
//! verifiably determines whether, and how many times, it is selected as a
//! block maker or as a committee voter. Selection is driven by a secp256k1
//! VRF over the agreed seed, compared ticket by ticket against a
//! stake-proportional difficulty threshold.
//!
//! The crate is pure computation: it persists nothing, performs no network
//! I/O, and reaches host state only through the narrow traits in
//! [`interfaces`]. Embedders typically construct a [`engine::Sorter`] for
//! producing selections, a [`verify::SortVerifier`] for validating received
//! messages, and a [`select::SortSelector`] for picking the round's winning
//! proposer.

pub mod crypto;
pub mod difficulty;
pub mod engine;
pub mod errors;
pub mod interfaces;
pub mod params;
pub mod select;
pub mod types;
pub mod verify;
pub mod vrf;

pub use crypto::SigningKey;
pub use difficulty::{meets_difficulty, DifficultyController};
pub use engine::Sorter;
pub use errors::{SortitionError, SortitionResult};
pub use interfaces::{DepositReader, DepositSnapshot, SeedSource, TicketHolder};
pub use params::{SortitionParams, MAKER_TRIALS};
pub use select::{min_sort_msg, MakerSelection, SortSelector, SortTable};
pub use types::{
    compute_sort_hash, Address, HashProof, SortHash, SortMsg, VrfInput, STEP_MAKER, STEP_VOTER,
};
pub use verify::SortVerifier;
