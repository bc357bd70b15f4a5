//! Concrete argument values and deployment outputs.

use alloy_core::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// A fully resolved constructor argument.
///
/// Plans and reports round-trip through TOML/JSON, so values are serialized
/// in their natural textual form (hex for addresses and hashes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// A 20-byte account or contract address.
    Address(Address),
    /// A 32-byte word, e.g. a transaction hash.
    Bytes32(B256),
    /// An unsigned 256-bit integer.
    Uint(U256),
    /// A boolean flag.
    Bool(bool),
    /// An arbitrary string.
    String(String),
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgValue::Address(a) => write!(f, "{a}"),
            ArgValue::Bytes32(b) => write!(f, "{b}"),
            ArgValue::Uint(u) => write!(f, "{u}"),
            ArgValue::Bool(b) => write!(f, "{b}"),
            ArgValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<Address> for ArgValue {
    fn from(value: Address) -> Self {
        ArgValue::Address(value)
    }
}

impl From<U256> for ArgValue {
    fn from(value: U256) -> Self {
        ArgValue::Uint(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_string())
    }
}

/// The result of one successful deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOutput {
    /// Address of the deployed instance.
    pub address: Address,
    /// Hash of the deployment transaction, if one was sent.
    ///
    /// Reused instances (skipped steps) carry no transaction hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

impl ResolvedOutput {
    /// Create an output with no transaction hash.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            tx_hash: None,
        }
    }

    /// Attach the deployment transaction hash.
    pub fn with_tx_hash(mut self, tx_hash: B256) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }

    /// Positional access to outputs: index 0 is the deployed address,
    /// index 1 the transaction hash.
    pub fn output(&self, index: usize) -> Option<ArgValue> {
        match index {
            0 => Some(ArgValue::Address(self.address)),
            1 => self.tx_hash.map(ArgValue::Bytes32),
            _ => None,
        }
    }
}
