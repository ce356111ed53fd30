use std::fmt::Display;

use alloy::{contract, providers::PendingTransactionError, sol_types, transports};

/// Error returned by the RPC provider as a result of call or
/// transaction execution.
#[derive(Debug, thiserror::Error)]
pub enum DexError {
    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unexpected empty RPC response")]
    NullResp,

    #[error("transaction ran out of gas")]
    OutOfGas,

    /// Revert reason, decoded from the revert data when it carries a
    /// standard `Error(string)` payload, the raw node message otherwise.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transaction timed out")]
    Timeout,

    #[error("unknown token: {0}")]
    UnknownToken(String),
}

impl DexError {
    /// Node or transport could not be reached, as opposed to the call being
    /// rejected by the contract.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::NullResp | Self::Timeout)
    }
}

impl From<contract::Error> for DexError {
    fn from(value: contract::Error) -> Self {
        match value {
            contract::Error::UnknownFunction(_) => Self::Fatal(value.to_string()),
            contract::Error::UnknownSelector(_) => Self::Fatal(value.to_string()),
            contract::Error::NotADeploymentTransaction => Self::Fatal(value.to_string()),
            contract::Error::ContractNotDeployed => Self::Fatal(value.to_string()),
            contract::Error::ZeroData(_, _) => Self::Fatal(value.to_string()),
            contract::Error::AbiError(_) => Self::Fatal(value.to_string()),
            contract::Error::TransportError(rpc_err) => Self::from(rpc_err),
            contract::Error::PendingTransactionError(err) => err.into(),
        }
    }
}

impl From<PendingTransactionError> for DexError {
    fn from(value: PendingTransactionError) -> Self {
        match value {
            PendingTransactionError::FailedToRegister => Self::Fatal(value.to_string()),
            PendingTransactionError::TransportError(rpc_err) => Self::from(rpc_err),
            PendingTransactionError::Recv(_) => Self::Transport(value.to_string()),
            PendingTransactionError::TxWatcher(err) => match err {
                alloy::providers::WatchTxError::Timeout => Self::Timeout,
            },
        }
    }
}

impl<E: Display> From<transports::RpcError<E>> for DexError {
    fn from(value: transports::RpcError<E>) -> Self {
        match value {
            transports::RpcError::ErrorResp(ref resp) => {
                // Heuristic to determine if eth_call failed due to OutOfGas or
                // if transaction was reverted during the gas estimation
                let msg = resp.message.to_ascii_lowercase();
                if (resp.code == -32603) && (msg.contains("gas") || msg.contains("oog")) {
                    Self::OutOfGas
                } else if resp.code == 3 || msg.contains("revert") {
                    let reason = resp
                        .as_revert_data()
                        .and_then(|data| sol_types::decode_revert_reason(&data))
                        .unwrap_or_else(|| resp.message.to_string());
                    Self::Reverted(reason)
                } else if (resp.code == -32600 || resp.code == -32601 || resp.code == -32602)
                    && (msg.contains("invalid") || msg.contains("not found"))
                {
                    Self::InvalidRequest(msg)
                } else {
                    Self::Transport(value.to_string())
                }
            }
            transports::RpcError::NullResp => Self::NullResp,
            _ => Self::Transport(value.to_string()),
        }
    }
}

impl From<sol_types::Error> for DexError {
    fn from(value: sol_types::Error) -> Self {
        Self::Fatal(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_errors() {
        assert!(DexError::Transport("connection refused".to_string()).is_connectivity());
        assert!(DexError::NullResp.is_connectivity());
        assert!(DexError::Timeout.is_connectivity());
        assert!(!DexError::Reverted("FEW_TIME_PASSED".to_string()).is_connectivity());
        assert!(!DexError::OutOfGas.is_connectivity());
    }

    #[test]
    fn test_null_response_maps_to_null_resp() {
        let err: transports::RpcError<String> = transports::RpcError::NullResp;
        assert!(matches!(DexError::from(err), DexError::NullResp));
    }
}
