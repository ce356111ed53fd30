mod outcome;
mod token;
mod withdrawal;

pub use outcome::*;
pub use token::{TokenConfig, TokenRegistry};
pub use withdrawal::*;

/// Token symbol as configured in the token registry, e.g. `STRK`.
pub type TokenSymbol = String;

/// Policy limits the exchange enforces between a withdrawal request and
/// its on-chain application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettlementLimits {
    /// Minimum number of blocks between request and apply.
    pub block_limit: u64,

    /// Minimum number of seconds between request and apply.
    pub time_limit: u64,
}

impl Default for SettlementLimits {
    fn default() -> Self {
        Self {
            block_limit: 2,
            time_limit: 60,
        }
    }
}

/// Remaining part of the settlement window, counted from the moment the
/// wait begins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SettlementWindow {
    remaining_blocks: u64,
    remaining_seconds: u64,
}

impl SettlementWindow {
    pub fn new(remaining_blocks: u64, remaining_seconds: u64) -> Self {
        Self {
            remaining_blocks,
            remaining_seconds,
        }
    }

    /// Window left after the exchange reported `block_delta` blocks and
    /// `time_delta` seconds already passed since the request.
    pub fn remaining(limits: &SettlementLimits, block_delta: u64, time_delta: u64) -> Self {
        Self {
            remaining_blocks: limits.block_limit.saturating_sub(block_delta),
            remaining_seconds: limits.time_limit.saturating_sub(time_delta),
        }
    }

    pub fn remaining_blocks(&self) -> u64 {
        self.remaining_blocks
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    /// Both clocks are satisfied.
    pub fn is_open(&self) -> bool {
        self.remaining_blocks == 0 && self.remaining_seconds == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_window_time_bound() {
        let window = SettlementWindow::remaining(&SettlementLimits::default(), 5, 42);
        assert_eq!(window, SettlementWindow::new(0, 18));
        assert!(!window.is_open());
    }

    #[test]
    fn test_remaining_window_nothing_passed() {
        let window = SettlementWindow::remaining(&SettlementLimits::default(), 0, 0);
        assert_eq!(window, SettlementWindow::new(2, 60));
    }

    #[test]
    fn test_remaining_window_saturates() {
        let window = SettlementWindow::remaining(&SettlementLimits::default(), 10, 600);
        assert_eq!(window, SettlementWindow::new(0, 0));
        assert!(window.is_open());
    }

    #[test]
    fn test_window_open_requires_both_clocks() {
        assert!(!SettlementWindow::new(1, 0).is_open());
        assert!(!SettlementWindow::new(0, 1).is_open());
    }
}
