use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use fastnum::{UD128, udec128};

use crate::types::{SkipReason, TokenRegistry, TokenSymbol, WithdrawalIntent};

/// Amount of each token that is never withdrawn.
#[derive(Clone, Debug, PartialEq)]
pub struct ReservePolicy {
    reserves: HashMap<TokenSymbol, UD128>,
}

impl ReservePolicy {
    /// No reserves at all.
    pub fn none() -> Self {
        Self {
            reserves: HashMap::new(),
        }
    }

    pub fn with_reserve(mut self, symbol: impl Into<TokenSymbol>, amount: UD128) -> Self {
        self.reserves.insert(symbol.into(), amount);
        self
    }

    pub fn reserve_for(&self, symbol: &str) -> UD128 {
        self.reserves.get(symbol).copied().unwrap_or(UD128::ZERO)
    }
}

impl Default for ReservePolicy {
    /// Keeps 1 STRK for gas.
    fn default() -> Self {
        Self::none().with_reserve("STRK", udec128!(1))
    }
}

/// One token of a [`Plan`].
#[derive(Clone, Debug, PartialEq)]
pub enum PlanEntry {
    Withdraw(WithdrawalIntent),
    Skip {
        symbol: TokenSymbol,
        balance: Option<UD128>,
        reason: SkipReason,
    },
}

impl PlanEntry {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Withdraw(intent) => &intent.symbol,
            Self::Skip { symbol, .. } => symbol,
        }
    }
}

/// Ordered withdrawal plan of a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Plan {
    entries: Vec<PlanEntry>,
}

impl Plan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn intents(&self) -> impl Iterator<Item = &WithdrawalIntent> {
        self.entries.iter().filter_map(|e| match e {
            PlanEntry::Withdraw(intent) => Some(intent),
            PlanEntry::Skip { .. } => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, &SkipReason)> {
        self.entries.iter().filter_map(|e| match e {
            PlanEntry::Skip { symbol, reason, .. } => Some((symbol.as_str(), reason)),
            PlanEntry::Withdraw(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.intents().next().is_none()
    }
}

/// Builds the withdrawal plan for `account` from its exchange balances.
///
/// Zero balances are dropped silently, input order is preserved. A token
/// whose balance does not exceed its reserve is skipped, otherwise the
/// amount above the reserve is withdrawn.
pub fn plan<I>(
    balances: I,
    registry: &TokenRegistry,
    account: Address,
    reserve: &ReservePolicy,
) -> Plan
where
    I: IntoIterator<Item = (TokenSymbol, U256)>,
{
    let entries = balances
        .into_iter()
        .filter(|(_, raw)| !raw.is_zero())
        .map(|(symbol, raw)| plan_token(symbol, raw, registry, account, reserve))
        .collect();
    Plan { entries }
}

fn plan_token(
    symbol: TokenSymbol,
    raw: U256,
    registry: &TokenRegistry,
    account: Address,
    reserve: &ReservePolicy,
) -> PlanEntry {
    let Some(token) = registry.by_symbol(&symbol) else {
        return PlanEntry::Skip {
            symbol,
            balance: None,
            reason: SkipReason::UnknownToken,
        };
    };
    let converter = token.converter();
    let Ok(balance) = converter.from_raw::<2>(raw) else {
        return PlanEntry::Skip {
            symbol,
            balance: None,
            reason: SkipReason::AmountOutOfRange(raw),
        };
    };

    let reserved = reserve.reserve_for(&symbol);
    if balance <= reserved {
        return PlanEntry::Skip {
            symbol,
            balance: Some(balance),
            reason: SkipReason::BelowReserve {
                balance,
                reserve: reserved,
            },
        };
    }

    let amount = balance - reserved;
    PlanEntry::Withdraw(WithdrawalIntent {
        raw_amount: converter.to_raw(amount),
        token: token.address,
        symbol,
        account,
        amount,
    })
}
