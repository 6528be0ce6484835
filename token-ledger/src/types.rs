//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact integer arithmetic (raw units, never rescaled)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Raw token units
pub type Amount = u64;

/// Fractional decimal digits carried by raw units
pub const DECIMALS: u8 = 6;

/// Maximum issue metadata length (characters)
pub const MAX_METADATA_LEN: usize = 500;

/// Default per-call issue cap: one million whole units
pub const DEFAULT_ISSUE_CAP: Amount = 1_000_000 * 10u64.pow(DECIMALS as u32);

/// Render raw units as an exact decimal with `decimals` fractional digits
pub fn format_units(amount: Amount, decimals: u8) -> Decimal {
    Decimal::from_i128_with_scale(amount as i128, decimals as u32)
}

/// Account identifier (public-key-derived address or any opaque principal)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an address from an Ed25519 public key
    ///
    /// `0x` followed by the first 20 bytes of the BLAKE3 digest, hex encoded.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let digest = blake3::hash(public_key);
        let hex = digest.to_hex();
        Self(format!("0x{}", &hex.as_str()[..40]))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Fixed token metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Human-readable name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Fractional decimal digits
    pub decimals: u8,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            name: "Reward Token".to_string(),
            symbol: "RWD".to_string(),
            decimals: DECIMALS,
        }
    }
}

/// Ledger mode, controlled solely by the pause flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Balance-mutating operations permitted
    Active,
    /// Balance-mutating operations rejected
    Paused,
}

/// Immutable mint-audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRecord {
    /// Sequence id, contiguous from 1
    pub sequence_id: u64,
    /// Amount issued
    pub amount: Amount,
    /// Credited account
    pub recipient: AccountId,
    /// Free-text provenance
    pub metadata: String,
    /// Issuing account
    pub issuer: AccountId,
    /// Issue time
    pub timestamp: DateTime<Utc>,
}

/// A mutating ledger call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Move units from caller to recipient
    Transfer {
        /// Credited account
        recipient: AccountId,
        /// Units moved
        amount: Amount,
    },
    /// Create units for recipient
    Issue {
        /// Units created
        amount: Amount,
        /// Credited account
        recipient: AccountId,
        /// Provenance text
        metadata: String,
    },
    /// Destroy caller's units
    Retire {
        /// Units destroyed
        amount: Amount,
    },
    /// Enter paused mode
    Pause,
    /// Leave paused mode
    Resume,
    /// Hand over administration
    SetAdministrator {
        /// New administrator
        new_admin: AccountId,
    },
    /// Grant issuer role
    AddIssuer {
        /// Account granted
        account: AccountId,
    },
    /// Revoke issuer role
    RemoveIssuer {
        /// Account revoked
        account: AccountId,
    },
    /// Replace the per-call issue cap
    SetIssueCap {
        /// New cap
        cap: Amount,
    },
}

impl Operation {
    /// Short name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Transfer { .. } => "transfer",
            Operation::Issue { .. } => "issue",
            Operation::Retire { .. } => "retire",
            Operation::Pause => "pause",
            Operation::Resume => "resume",
            Operation::SetAdministrator { .. } => "set_administrator",
            Operation::AddIssuer { .. } => "add_issuer",
            Operation::RemoveIssuer { .. } => "remove_issuer",
            Operation::SetIssueCap { .. } => "set_issue_cap",
        }
    }

    /// Whether this operation changes balances
    pub fn mutates_balances(&self) -> bool {
        matches!(
            self,
            Operation::Transfer { .. } | Operation::Issue { .. } | Operation::Retire { .. }
        )
    }
}

/// Result of a committed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receipt {
    /// Non-issue operation applied
    Applied,
    /// Issue applied, audit record appended
    Issued(MintRecord),
}

/// Journal entry for one committed operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Journal position, contiguous from 1
    pub sequence: u64,

    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Identity that invoked the operation
    pub caller: AccountId,

    /// The operation
    pub operation: Operation,

    /// Commit time
    pub timestamp: DateTime<Utc>,

    /// Digital signature (Ed25519), zeroed when the ledger runs unsigned
    pub signature: Signature,
}

impl LedgerEvent {
    /// Create canonical bytes for signing (everything except the signature)
    pub fn canonical_bytes(&self) -> crate::Result<Vec<u8>> {
        let bytes = bincode::serialize(&(
            self.sequence,
            &self.event_id,
            &self.caller,
            &self.operation,
            &self.timestamp,
        ))?;
        Ok(bytes)
    }

    /// Verify signature
    pub fn verify_signature(&self, public_key: &[u8; 32]) -> bool {
        match self.canonical_bytes() {
            Ok(bytes) => self.signature.verify(&bytes, public_key),
            Err(_) => false,
        }
    }
}

/// Digital signature (Ed25519)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature bytes (64 bytes)
    #[serde(with = "serde_bytes")]
    bytes: [u8; 64],
}

impl Signature {
    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// All-zero placeholder
    pub fn empty() -> Self {
        Self { bytes: [0u8; 64] }
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    /// Verify signature
    pub fn verify(&self, message: &[u8], public_key: &[u8; 32]) -> bool {
        crate::crypto::verify_signature(message, self, public_key)
    }
}

/// Point-in-time summary of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Token metadata
    pub metadata: TokenMetadata,
    /// Total supply
    pub total_supply: Amount,
    /// Current mode
    pub mode: Mode,
    /// Current administrator
    pub administrator: AccountId,
    /// Reserved owner
    pub owner: AccountId,
    /// Per-call issue cap
    pub issue_cap: Amount,
    /// Audit records created so far
    pub mint_sequence: u64,
    /// Non-zero balances, ordered by account
    pub holders: Vec<(AccountId, Amount)>,
}
