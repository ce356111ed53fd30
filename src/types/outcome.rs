use alloy::primitives::U256;
use fastnum::UD128;

use super::{SettlementKey, SettlementReceipt, TokenSymbol};

/// Why a token was left out of the withdrawal plan.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("balance {balance} does not exceed reserve {reserve}")]
    BelowReserve { balance: UD128, reserve: UD128 },

    #[error("token is not in the registry")]
    UnknownToken,

    #[error("balance {0} is out of representable range")]
    AmountOutOfRange(U256),
}

/// Why settlement of a token was given up.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AbandonReason {
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("connectivity failure: {0}")]
    Connectivity(String),

    #[error("no pending handle: {0}")]
    NoPendingHandle(String),

    #[error("apply returned no result")]
    EmptyApplyResult,

    #[error("settlement window still closed after {0} wait cycles")]
    WaitBudgetExhausted(u32),

    #[error("settlement window wait deadline exceeded")]
    WaitDeadlineExceeded,
}

/// Terminal state of a single intent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementOutcome {
    Applied {
        key: SettlementKey,
        receipt: SettlementReceipt,
        wait_cycles: u32,
    },
    Abandoned(AbandonReason),
    /// Shutdown was requested before the withdrawal could be applied.
    Cancelled,
}

impl SettlementOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// What happened to a token in a batch run.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenOutcome {
    Settled(SettlementOutcome),
    Skipped(SkipReason),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReportEntry {
    pub symbol: TokenSymbol,
    /// Planned amount, `None` for tokens skipped before an amount was known.
    pub amount: Option<UD128>,
    pub outcome: TokenOutcome,
}

/// Summary of a batch run, one entry per token considered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub entries: Vec<ReportEntry>,
}

impl BatchReport {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, TokenOutcome::Settled(s) if s.is_applied()))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TokenOutcome::Skipped(_)))
    }

    pub fn abandoned(&self) -> usize {
        self.count(|o| matches!(o, TokenOutcome::Settled(SettlementOutcome::Abandoned(_))))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, TokenOutcome::Settled(SettlementOutcome::Cancelled)))
    }

    pub fn get(&self, symbol: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }

    fn count(&self, f: impl Fn(&TokenOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| f(&e.outcome)).count()
    }
}
