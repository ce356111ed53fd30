//! Withdrawal tool for the DEX exchange.
//!
//! This binary moves exchange balances of an account back on-chain,
//! waiting out the exchange settlement window between request and apply.

mod config;
mod error;
mod prompt;
mod tool;

use std::{fs::OpenOptions, process::exit, sync::Mutex, time::Duration};

use alloy::{network::EthereumWallet, signers::local::PrivateKeySigner};
use clap::Parser;
use dex_withdraw::{Chain, gateway::GasFeePolicy, shutdown};
use tracing::{error, info, warn};
use url::Url;

use config::{CliConfig, Command, ConfigError, EnvConfig};
use error::{Error, Result};
use tool::WithdrawTool;

#[tokio::main]
async fn main() {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    // Parse environment configuration
    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", Error::from(e));
            exit(1);
        }
    };

    // Parse CLI arguments
    let cli_config = CliConfig::parse();

    // Set up logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    let subscriber =
        tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env());
    match env_config.log_file.as_deref() {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => subscriber
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init(),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path, e);
                exit(1);
            }
        },
        None => subscriber.init(),
    }

    let tool = match build_tool(&env_config) {
        Ok(tool) => tool,
        Err(e) => {
            error!(%e, "Failed to create withdrawal tool");
            exit(1);
        }
    };

    let result = match cli_config.command {
        Command::Balances => tool.balances().await,
        Command::BindSigner => tool.bind_signer().await.map(|binding| {
            info!(?binding, "Signer binding");
        }),
        Command::Withdraw(args) => {
            let (trigger, shutdown) = shutdown::channel();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current step");
                    trigger.trigger();
                }
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Second interrupt received, exiting");
                    exit(130);
                }
            });
            tool.withdraw(&args, &shutdown).await.map(|_| ())
        }
    };

    if let Err(e) = result {
        error!(%e, "Withdrawal tool encountered an error, shutting down");
        exit(1);
    }
}

fn build_tool(env_config: &EnvConfig) -> Result<WithdrawTool> {
    let exchange_address = env_config.exchange_address()?;
    let trading_account = env_config.trading_account()?;
    let tokens = env_config.token_registry()?;
    let fee_token = tokens
        .by_symbol(env_config.fee_token())
        .map(|t| t.address)
        .ok_or_else(|| ConfigError::UnknownFeeToken(env_config.fee_token().to_string()))?;

    let private_key: PrivateKeySigner = env_config.private_key.parse()?;
    let wallet = EthereumWallet::new(private_key);
    let node_url = Url::parse(&env_config.node_rpc_url)?;

    let mut gas_fee = GasFeePolicy::new(fee_token);
    if let Some(gas_per_action) = env_config.gas_per_action {
        gas_fee.gas_per_action = gas_per_action;
    }
    if let Some(multiplier) = env_config.gas_multiplier_pct {
        gas_fee.gas_price_multiplier_pct = multiplier;
    }

    let chain = Chain::custom(
        env_config.chain_id,
        exchange_address,
        tokens,
        env_config.fee_token(),
    );

    // Default timeout is 30 seconds
    let timeout = Duration::from_secs(env_config.timeout_seconds.unwrap_or(30));

    WithdrawTool::try_new(node_url, wallet, chain, trading_account, gas_fee, timeout)
}
