//! Narrow capability interfaces through which the core reaches host state.
//! Implementations are supplied by the embedding node; the core never touches
//! storage or the network directly.

use crate::crypto::SigningKey;
use crate::errors::SortitionResult;

/// Deposit state of one address at the snapshot the host serves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepositSnapshot {
    /// Active ticket count.
    pub count: u64,
    /// Ticket count before the most recent close, used while the close is
    /// still inside the sortition delay window.
    pub pre_count: u64,
    /// Height at which the deposit was closed; negative when never closed.
    pub close_height: i64,
}

impl DepositSnapshot {
    /// Ticket count that selection at `height` may use, given the delayed
    /// snapshot rule: a close at or after `height - sort_delay` has not yet
    /// taken effect.
    pub fn effective_count(&self, height: i64, sort_delay: i64) -> u64 {
        if self.close_height >= height - sort_delay {
            self.pre_count
        } else {
            self.count
        }
    }
}

/// Source of the public sortition seed agreed for a height.
pub trait SeedSource: Send + Sync {
    fn sort_seed(&self, height: i64) -> SortitionResult<[u8; 32]>;
}

/// Read access to on-chain deposit state.
pub trait DepositReader: Send + Sync {
    fn deposit(&self, address: &str) -> SortitionResult<DepositSnapshot>;

    /// Total tickets across all deposits at a snapshot height.
    fn total_tickets(&self, height: i64) -> u64;
}

/// Access to the local participant's key and stake.
pub trait TicketHolder: Send + Sync {
    /// Returns `None` when no signing key is available; sortition then
    /// produces nothing for the round.
    fn signing_key(&self) -> Option<SigningKey>;

    fn ticket_count(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_inside_delay_window_uses_pre_count() {
        let deposit = DepositSnapshot {
            count: 3,
            pre_count: 8,
            close_height: 95,
        };
        assert_eq!(deposit.effective_count(100, 10), 8);
        assert_eq!(deposit.effective_count(200, 10), 3);
    }

    #[test]
    fn never_closed_deposit_uses_live_count() {
        let deposit = DepositSnapshot {
            count: 5,
            pre_count: 0,
            close_height: -1,
        };
        assert_eq!(deposit.effective_count(100, 10), 5);
    }
}
