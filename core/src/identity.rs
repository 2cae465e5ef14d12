//! Peer identifiers and the wallet-backed network identity

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const ADDRESS_PREFIX: &str = "0x";
const ADDRESS_HEX_LEN: usize = 40;

/// How a human-entered identifier should be treated by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// `0x` followed by 40 hex digits; must be looked up to an inbox id.
    Address,
    /// Anything else is passed through as an inbox id.
    InboxId,
}

pub fn classify_identifier(identifier: &str) -> IdentifierKind {
    if is_network_address(identifier) {
        IdentifierKind::Address
    } else {
        IdentifierKind::InboxId
    }
}

pub fn is_network_address(identifier: &str) -> bool {
    match identifier.strip_prefix(ADDRESS_PREFIX) {
        Some(hex_part) => hex_part.len() == ADDRESS_HEX_LEN && hex::decode(hex_part).is_ok(),
        None => false,
    }
}

/// `0x1234...abcd` for address-like strings, verbatim otherwise.
pub fn display_name(identifier: &str) -> String {
    if identifier.is_empty() {
        return "Unknown".to_string();
    }

    let chars: Vec<char> = identifier.chars().collect();
    if identifier.starts_with(ADDRESS_PREFIX) && chars.len() >= 10 {
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        identifier.to_string()
    }
}

/// Addresses compare case-insensitively; inbox ids compare exactly.
pub fn same_identifier(a: &str, b: &str) -> bool {
    if a.starts_with(ADDRESS_PREFIX) && b.starts_with(ADDRESS_PREFIX) {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

// ============================================================================
// Wallet
// ============================================================================

/// Connected wallet supplying the account address and a signing capability.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn address(&self) -> Option<String>;

    async fn sign_message(&self, message: &str) -> Result<Vec<u8>>;
}

/// Identity presented to the messaging network for one connected session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub address: String,
    pub identity_key: String,
    pub inbox_id: Option<String>,
}

impl NetworkIdentity {
    /// Whether `sender` refers to the local user.
    pub fn is_self(&self, sender: &str) -> bool {
        same_identifier(&self.address, sender)
            || self.inbox_id.as_deref().is_some_and(|id| id == sender)
    }
}

pub fn identity_challenge(address: &str) -> String {
    format!("Glorp identity for {address}")
}

/// Sign the identity challenge and derive the session key from the signature.
pub async fn derive_identity(wallet: &dyn WalletProvider) -> Result<NetworkIdentity> {
    let address = wallet
        .address()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| Error::Wallet("no connected account".into()))?;

    let signature = wallet.sign_message(&identity_challenge(&address)).await?;
    if signature.is_empty() {
        return Err(Error::Wallet("empty signature".into()));
    }

    let mut hasher = Sha256::new();
    hasher.update(&signature);

    Ok(NetworkIdentity {
        address,
        identity_key: hex::encode(hasher.finalize()),
        inbox_id: None,
    })
}
