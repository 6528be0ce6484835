//! Token Ledger
//!
//! Fungible-unit ledger with issuer-gated issuance, holder-driven retirement,
//! an append-only mint-audit log and a single administrator with
//! emergency-stop power.
//!
//! # Architecture
//!
//! - **State machine**: `LedgerCore` owns balances, supply, roles and the audit log
//! - **Single Writer**: One actor task serializes every call
//! - **Journal**: Committed operations are persisted to RocksDB and replayed on open
//! - **Merkle Tree**: Inclusion proofs for audit records
//!
//! # Invariants
//!
//! - Conservation: total supply == Σ(balances) after every call
//! - Non-negativity: no balance ever goes below zero
//! - Atomicity: a rejected call changes nothing
//! - Audit contiguity: record ids run 1..=N in creation order

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod actor;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod merkle;
pub mod metrics;
pub mod state;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use state::LedgerCore;
pub use types::{AccountId, Amount, LedgerSnapshot, MintRecord, Mode, Operation, TokenMetadata};
