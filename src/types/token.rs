use alloy::primitives::Address;

use super::TokenSymbol;
use crate::{error::DexError, num};

/// Token listed on the exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenConfig {
    pub symbol: TokenSymbol,
    pub address: Address,
    pub decimals: u8,
}

impl TokenConfig {
    pub fn new(symbol: impl Into<TokenSymbol>, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            address,
            decimals,
        }
    }

    pub fn converter(&self) -> num::Converter {
        num::Converter::new(self.decimals)
    }
}

/// Read-only token table, in configuration order.
#[derive(Clone, Debug, Default)]
pub struct TokenRegistry {
    tokens: Vec<TokenConfig>,
}

impl TokenRegistry {
    pub fn new(tokens: Vec<TokenConfig>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[TokenConfig] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&TokenConfig> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }

    pub fn by_address(&self, address: Address) -> Option<&TokenConfig> {
        self.tokens.iter().find(|t| t.address == address)
    }

    /// Address of the token with the given symbol.
    pub fn address_of(&self, symbol: &str) -> Result<Address, DexError> {
        self.by_symbol(symbol)
            .map(|t| t.address)
            .ok_or_else(|| DexError::UnknownToken(symbol.to_string()))
    }

    /// Symbol of the token deployed at the given address.
    pub fn symbol_of(&self, address: Address) -> Result<&str, DexError> {
        self.by_address(address)
            .map(|t| t.symbol.as_str())
            .ok_or_else(|| DexError::UnknownToken(address.to_string()))
    }
}
