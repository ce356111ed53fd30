//! Configuration for the withdrawal tool.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): connection details, keys, tokens
//! - CLI arguments: command and settlement policy

use std::time::Duration;

use alloy::primitives::{Address, hex::FromHexError};
use clap::{Args, Parser, Subcommand};
use dex_withdraw::{
    orchestrator::{ReservePolicy, SettlementPolicy},
    types::{SettlementLimits, TokenConfig, TokenRegistry},
    waiter::WaitPolicy,
};
use fastnum::{UD128, decimal::Context};

/// Environment configuration (connection details, credentials, tokens).
#[derive(Debug, serde::Deserialize)]
pub struct EnvConfig {
    /// Chain ID
    pub chain_id: u64,

    /// Exchange contract address
    pub exchange_address: String,

    /// Private key for signing transactions
    pub private_key: String,

    /// RPC URL for the node
    pub node_rpc_url: String,

    /// Exchange account to withdraw from (default: wallet address)
    pub trading_account: Option<String>,

    /// Token list, `SYMBOL:ADDRESS:DECIMALS` comma-separated
    pub tokens: String,

    /// Symbol of the token gas compensation is paid in (default: STRK)
    pub fee_token: Option<String>,

    /// Gas units charged per withdrawal action (default: 100)
    pub gas_per_action: Option<u32>,

    /// Max gas price as percentage of the node gas price (default: 150)
    pub gas_multiplier_pct: Option<u32>,

    /// Optional timeout for chain reads (default: 30s)
    pub timeout_seconds: Option<u64>,

    /// Append logs to this file instead of stderr
    pub log_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Parse the exchange address.
    pub fn exchange_address(&self) -> Result<Address, FromHexError> {
        self.exchange_address.parse()
    }

    /// Parse the trading account address, if configured.
    pub fn trading_account(&self) -> Result<Option<Address>, FromHexError> {
        self.trading_account.as_deref().map(str::parse).transpose()
    }

    pub fn token_registry(&self) -> Result<TokenRegistry, ConfigError> {
        parse_tokens(&self.tokens)
    }

    pub fn fee_token(&self) -> &str {
        self.fee_token.as_deref().unwrap_or("STRK")
    }
}

/// Parses `SYMBOL:ADDRESS:DECIMALS,...` into a registry, keeping order.
pub fn parse_tokens(spec: &str) -> Result<TokenRegistry, ConfigError> {
    let mut tokens: Vec<TokenConfig> = Vec::new();
    for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let [symbol, address, decimals] = item.split(':').map(str::trim).collect::<Vec<_>>()[..]
        else {
            return Err(ConfigError::InvalidTokenSpec(item.to_string()));
        };
        if symbol.is_empty() {
            return Err(ConfigError::InvalidTokenSpec(item.to_string()));
        }
        let address: Address = address
            .parse()
            .map_err(|_| ConfigError::InvalidTokenAddress(item.to_string()))?;
        let decimals: u8 = decimals
            .parse()
            .map_err(|_| ConfigError::InvalidDecimals(item.to_string()))?;
        if tokens.iter().any(|t| t.symbol == symbol) {
            return Err(ConfigError::DuplicateToken(symbol.to_string()));
        }
        tokens.push(TokenConfig::new(symbol, address, decimals));
    }

    if tokens.is_empty() {
        return Err(ConfigError::NoTokens);
    }
    Ok(TokenRegistry::new(tokens))
}

/// CLI arguments.
#[derive(Debug, Parser)]
#[command(name = "withdraw")]
#[command(about = "On-chain withdrawal of exchange balances")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show nonce, bound signer and non-zero exchange balances
    Balances,

    /// Bind the wallet as account signer if no signer is bound yet
    BindSigner,

    /// Withdraw all balances above their reserves
    Withdraw(WithdrawArgs),
}

#[derive(Debug, Args)]
pub struct WithdrawArgs {
    /// Do not ask for confirmation
    #[arg(long)]
    pub yes: bool,

    /// Amount of a token to keep on the exchange, e.g. "STRK=1".
    /// Replaces the default reserve of the same token
    #[arg(long = "reserve", value_name = "SYMBOL=AMOUNT")]
    pub reserves: Vec<String>,

    /// "Too early" rejections tolerated per token
    #[arg(long, default_value_t = 10)]
    pub max_wait_cycles: u32,

    /// Delay between settlement window polls
    #[arg(long, default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Upper bound on a single settlement window wait
    #[arg(long, default_value_t = 600)]
    pub max_wait_secs: u64,

    /// Pause between two tokens
    #[arg(long, default_value_t = 2)]
    pub pacing_secs: u64,

    /// Minimum blocks between request and apply
    #[arg(long, default_value_t = 2)]
    pub block_limit: u64,

    /// Minimum seconds between request and apply
    #[arg(long, default_value_t = 60)]
    pub time_limit: u64,
}

impl WithdrawArgs {
    pub fn settlement_policy(&self) -> SettlementPolicy {
        SettlementPolicy {
            limits: SettlementLimits {
                block_limit: self.block_limit,
                time_limit: self.time_limit,
            },
            max_wait_cycles: self.max_wait_cycles,
            pacing: Duration::from_secs(self.pacing_secs),
        }
    }

    /// Rejects flag combinations that can never settle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_wait_secs < self.time_limit {
            return Err(ConfigError::WaitBelowTimeLimit {
                max_wait: self.max_wait_secs,
                time_limit: self.time_limit,
            });
        }
        Ok(())
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }

    /// Default reserves overridden by `--reserve` flags.
    pub fn reserve_policy(&self) -> Result<ReservePolicy, ConfigError> {
        self.reserves
            .iter()
            .try_fold(ReservePolicy::default(), |policy, item| {
                let (symbol, amount) = parse_reserve(item)?;
                Ok(policy.with_reserve(symbol, amount))
            })
    }
}

fn parse_reserve(item: &str) -> Result<(&str, UD128), ConfigError> {
    let (symbol, amount) = item
        .split_once('=')
        .map(|(s, a)| (s.trim(), a.trim()))
        .filter(|(s, _)| !s.is_empty())
        .ok_or_else(|| ConfigError::InvalidReserve(item.to_string()))?;
    let amount = UD128::from_str(amount, Context::default())
        .map_err(|_| ConfigError::InvalidReserve(item.to_string()))?;
    Ok((symbol, amount))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid token entry '{0}', expected SYMBOL:ADDRESS:DECIMALS")]
    InvalidTokenSpec(String),

    #[error("Invalid token address in '{0}'")]
    InvalidTokenAddress(String),

    #[error("Invalid token decimals in '{0}'")]
    InvalidDecimals(String),

    #[error("Token {0} is listed more than once")]
    DuplicateToken(String),

    #[error("No tokens configured")]
    NoTokens,

    #[error("Fee token {0} is not in the token list")]
    UnknownFeeToken(String),

    #[error("Invalid reserve '{0}', expected SYMBOL=AMOUNT")]
    InvalidReserve(String),

    #[error("Max wait of {max_wait}s is shorter than the {time_limit}s time limit")]
    WaitBelowTimeLimit { max_wait: u64, time_limit: u64 },
}
