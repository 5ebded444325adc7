use std::io;

use thiserror::Error;

use crate::vrf::VrfError;

#[derive(Debug, Error)]
pub enum SortitionError {
    #[error("vrf verification failed: {0}")]
    VrfFailed(#[from] VrfError),
    #[error("invalid sortition message: {0}")]
    InvalidSortMsg(String),
    #[error("ticket index {index} outside stake snapshot count {count}")]
    InvalidIndex { index: i64, count: u64 },
    #[error("slot identifier {num} outside [0, {max})")]
    InvalidNum { num: i32, max: i32 },
    #[error("recomputed sort hash does not match the declared hash")]
    HashMismatch,
    #[error("sort hash above declared difficulty {diff}")]
    DiffExceeded { diff: f64 },
    #[error("deposit lookup failed: {0}")]
    DepositLookup(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cryptography error: {0}")]
    Crypto(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type SortitionResult<T> = Result<T, SortitionError>;
