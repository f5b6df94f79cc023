//! Token value type and wrapped-asset derivation

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Symbol prefix the bridge uses for its synthetic representations
pub const WRAPPED_PREFIX: &str = "u";

/// A token on a specific chain. Equality is by (symbol, chain_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub address: String,
    pub chain_id: u64,
    pub chain_name: String,
    #[serde(default)]
    pub is_wrapped: bool,
}

impl Token {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        decimals: u8,
        address: impl Into<String>,
        chain_id: u64,
        chain_name: impl Into<String>,
        is_wrapped: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            decimals,
            address: address.into(),
            chain_id,
            chain_name: chain_name.into(),
            is_wrapped,
        }
    }

    /// Symbol of the underlying native asset (`uETH` -> `ETH`)
    pub fn base_symbol(&self) -> &str {
        if self.is_wrapped {
            self.symbol
                .strip_prefix(WRAPPED_PREFIX)
                .unwrap_or(&self.symbol)
        } else {
            &self.symbol
        }
    }

    /// Whether both tokens represent the same underlying asset
    pub fn same_asset(&self, other: &Token) -> bool {
        self.base_symbol() == other.base_symbol()
    }

    /// Bridge-synthetic counterpart of this token on the same chain
    pub fn wrapped_form(&self) -> Token {
        if self.is_wrapped {
            return self.clone();
        }

        let symbol = format!("{}{}", WRAPPED_PREFIX, self.symbol);
        Token {
            address: synthetic_address(self.chain_id, &symbol),
            symbol,
            name: format!("Wrapped {}", self.name),
            decimals: self.decimals,
            chain_id: self.chain_id,
            chain_name: self.chain_name.clone(),
            is_wrapped: true,
        }
    }

    /// The same wrapped asset after its custody record moved to another chain
    pub fn on_chain(&self, chain_id: u64, chain_name: &str) -> Token {
        Token {
            address: synthetic_address(chain_id, &self.symbol),
            chain_id,
            chain_name: chain_name.to_string(),
            ..self.clone()
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol && self.chain_id == other.chain_id
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        self.chain_id.hash(state);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.chain_id)
    }
}

/// Deterministic 20-byte address for bridge-minted tokens
fn synthetic_address(chain_id: u64, symbol: &str) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(chain_id.to_be_bytes());
    hasher.update(symbol.as_bytes());
    let digest = hasher.finalize();
    format!("0x{}", hex::encode(&digest[12..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth() -> Token {
        Token::new("ETH", "Ether", 18, "0x0", 1, "ethereum", false)
    }

    #[test]
    fn test_equality_by_symbol_and_chain() {
        let mut other = eth();
        other.name = "Something else".to_string();
        other.address = "0xdead".to_string();
        assert_eq!(eth(), other);

        other.chain_id = 137;
        assert_ne!(eth(), other);
    }

    #[test]
    fn test_wrapped_form() {
        let wrapped = eth().wrapped_form();
        assert_eq!(wrapped.symbol, "uETH");
        assert!(wrapped.is_wrapped);
        assert_eq!(wrapped.base_symbol(), "ETH");
        assert_eq!(wrapped.decimals, 18);
        assert_eq!(wrapped.address.len(), 42);
        assert!(wrapped.same_asset(&eth()));

        // wrapping is idempotent
        assert_eq!(wrapped.wrapped_form(), wrapped);
    }

    #[test]
    fn test_on_chain_keeps_symbol() {
        let moved = eth().wrapped_form().on_chain(137, "polygon");
        assert_eq!(moved.symbol, "uETH");
        assert_eq!(moved.chain_id, 137);
        assert_eq!(moved.chain_name, "polygon");
        assert!(moved.is_wrapped);
    }

    #[test]
    fn test_native_symbol_with_prefix_letter() {
        let uni = Token::new("UNI", "Uniswap", 18, "0x1", 1, "ethereum", false);
        assert_eq!(uni.base_symbol(), "UNI");
    }
}
