//! Main ledger orchestration layer
//!
//! This module ties together state, storage, crypto, and actor components
//! into the high-level async API used by collaborators.
//!
//! # Example
//!
//! ```no_run
//! use token_ledger::{AccountId, Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> token_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config).await?;
//!
//!     let deployer = AccountId::new("deployer");
//!     let alice = AccountId::new("alice");
//!     ledger.issue(&deployer, 1_000_000, &alice, "reward").await?;
//!     assert_eq!(ledger.balance_of(&alice).await?, 1_000_000);
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    crypto::KeyPair,
    merkle::MerkleProof,
    metrics::Metrics,
    state::LedgerCore,
    storage::{Genesis, Storage},
    types::{
        AccountId, Amount, LedgerEvent, LedgerSnapshot, MintRecord, Operation, Receipt,
        TokenMetadata,
    },
    Config, Error, Result,
};
use chrono::Utc;
use tokio::task::JoinHandle;

/// Main ledger interface
pub struct Ledger {
    /// Actor handle for async operations
    handle: LedgerHandle,

    /// Actor task, awaited on shutdown
    actor: JoinHandle<()>,

    /// Metrics shared with the actor
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open an unsigned ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        Self::open_inner(config, None).await
    }

    /// Open a ledger whose journal entries are signed with `keypair`
    pub async fn open_signed(config: Config, keypair: KeyPair) -> Result<Self> {
        Self::open_inner(config, Some(keypair)).await
    }

    async fn open_inner(config: Config, keypair: Option<KeyPair>) -> Result<Self> {
        config.validate()?;

        let signer = keypair.as_ref().map(KeyPair::public_key);
        let (core, storage, last_sequence) = if config.storage.enabled {
            let storage = Storage::open(&config.storage)?;
            let genesis = match storage.load_genesis()? {
                Some(genesis) => {
                    if genesis.signer != signer {
                        return Err(Error::Config(
                            "journal signer does not match the supplied key pair".to_string(),
                        ));
                    }
                    genesis
                }
                None => {
                    let genesis = genesis_from_config(&config, signer);
                    storage.put_genesis(&genesis)?;
                    tracing::info!(deployer = %genesis.deployer, "Genesis written");
                    genesis
                }
            };
            let (core, last_sequence) = replay(&genesis, &storage)?;
            (core, Some(storage), last_sequence)
        } else {
            let genesis = genesis_from_config(&config, signer);
            (core_from_genesis(&genesis)?, None, 0)
        };

        tracing::info!(
            service = %config.service_name,
            administrator = %core.administrator(),
            total_supply = core.total_supply(),
            mint_sequence = core.mint_sequence(),
            journal_sequence = last_sequence,
            persistent = storage.is_some(),
            "Ledger opened"
        );

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        let (handle, actor) = spawn_ledger_actor(
            core,
            storage,
            keypair,
            metrics.clone(),
            last_sequence,
            config.actor.mailbox_capacity,
        )?;

        Ok(Self {
            handle,
            actor,
            metrics,
            config,
        })
    }

    /// Cloneable handle for concurrent callers
    pub fn handle(&self) -> LedgerHandle {
        self.handle.clone()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration the ledger was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    // Balance-mutating operations

    /// Move `amount` from `caller` to `recipient`
    pub async fn transfer(
        &self,
        caller: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        self.apply(
            caller,
            Operation::Transfer {
                recipient: recipient.clone(),
                amount,
            },
        )
        .await
    }

    /// Create units for `recipient`; returns the audit record id
    pub async fn issue(
        &self,
        caller: &AccountId,
        amount: Amount,
        recipient: &AccountId,
        metadata: &str,
    ) -> Result<u64> {
        let receipt = self
            .handle
            .execute(
                caller.clone(),
                Operation::Issue {
                    amount,
                    recipient: recipient.clone(),
                    metadata: metadata.to_string(),
                },
            )
            .await?;

        match receipt {
            Receipt::Issued(record) => Ok(record.sequence_id),
            Receipt::Applied => Err(Error::InvariantViolation(
                "issue committed without an audit record".to_string(),
            )),
        }
    }

    /// Destroy `amount` of the caller's units
    pub async fn retire(&self, caller: &AccountId, amount: Amount) -> Result<()> {
        self.apply(caller, Operation::Retire { amount }).await
    }

    // Administrative operations

    /// Enter paused mode
    pub async fn pause(&self, caller: &AccountId) -> Result<()> {
        self.apply(caller, Operation::Pause).await
    }

    /// Leave paused mode
    pub async fn resume(&self, caller: &AccountId) -> Result<()> {
        self.apply(caller, Operation::Resume).await
    }

    /// Replace the administrator
    pub async fn set_administrator(&self, caller: &AccountId, new_admin: &AccountId) -> Result<()> {
        self.apply(
            caller,
            Operation::SetAdministrator {
                new_admin: new_admin.clone(),
            },
        )
        .await
    }

    /// Grant the issuer role
    pub async fn add_issuer(&self, caller: &AccountId, account: &AccountId) -> Result<()> {
        self.apply(
            caller,
            Operation::AddIssuer {
                account: account.clone(),
            },
        )
        .await
    }

    /// Revoke the issuer role
    pub async fn remove_issuer(&self, caller: &AccountId, account: &AccountId) -> Result<()> {
        self.apply(
            caller,
            Operation::RemoveIssuer {
                account: account.clone(),
            },
        )
        .await
    }

    /// Replace the per-call issue cap
    pub async fn set_issue_cap(&self, caller: &AccountId, cap: Amount) -> Result<()> {
        self.apply(caller, Operation::SetIssueCap { cap }).await
    }

    async fn apply(&self, caller: &AccountId, operation: Operation) -> Result<()> {
        self.handle.execute(caller.clone(), operation).await?;
        Ok(())
    }

    // Read accessors

    /// Balance of `account` (0 if unknown)
    pub async fn balance_of(&self, account: &AccountId) -> Result<Amount> {
        self.handle.balance_of(account.clone()).await
    }

    /// Total supply
    pub async fn total_supply(&self) -> Result<Amount> {
        self.handle.total_supply().await
    }

    /// Whether `account` is an issuer
    pub async fn is_issuer(&self, account: &AccountId) -> Result<bool> {
        self.handle.is_issuer(account.clone()).await
    }

    /// Whether the ledger is paused
    pub async fn is_paused(&self) -> Result<bool> {
        self.handle.is_paused().await
    }

    /// Current administrator
    pub async fn administrator(&self) -> Result<AccountId> {
        self.handle.administrator().await
    }

    /// Audit record by id; `None` when no such record exists
    pub async fn mint_record(&self, sequence_id: u64) -> Result<Option<MintRecord>> {
        self.handle.mint_record(sequence_id).await
    }

    /// Token name, symbol and decimals
    pub async fn metadata(&self) -> Result<TokenMetadata> {
        self.handle.metadata().await
    }

    /// Point-in-time summary
    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.handle.snapshot().await
    }

    /// Merkle root over the audit log
    pub async fn audit_root(&self) -> Result<[u8; 32]> {
        self.handle.audit_root().await
    }

    /// Inclusion proof for an audit record
    pub async fn audit_proof(&self, sequence_id: u64) -> Result<Option<MerkleProof>> {
        self.handle.audit_proof(sequence_id).await
    }

    /// Shutdown ledger; returns once the actor has released storage
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await?;
        self.actor
            .await
            .map_err(|e| Error::Concurrency(format!("Actor task failed: {}", e)))
    }
}

fn genesis_from_config(config: &Config, signer: Option<[u8; 32]>) -> Genesis {
    Genesis {
        deployer: AccountId::new(config.genesis.deployer.clone()),
        issue_cap: config.genesis.issue_cap,
        metadata: config.token.clone(),
        signer,
        created_at: Utc::now(),
    }
}

fn core_from_genesis(genesis: &Genesis) -> Result<LedgerCore> {
    LedgerCore::new(
        genesis.deployer.clone(),
        genesis.issue_cap,
        genesis.metadata.clone(),
    )
}

/// Rebuild state by re-executing the journal in order
///
/// Returns the core and the last journal sequence.
fn replay(genesis: &Genesis, storage: &Storage) -> Result<(LedgerCore, u64)> {
    let mut core = core_from_genesis(genesis)?;
    let mut last_sequence = 0;

    for event in storage.events()? {
        replay_event(&mut core, genesis, storage, &event, last_sequence + 1)?;
        last_sequence = event.sequence;
    }

    let stored_last = storage.last_sequence()?;
    if stored_last != last_sequence {
        return Err(Error::JournalCorrupted(format!(
            "journal ends at {} but replay reached {}",
            stored_last, last_sequence
        )));
    }

    core.check_invariants()?;
    Ok((core, last_sequence))
}

fn replay_event(
    core: &mut LedgerCore,
    genesis: &Genesis,
    storage: &Storage,
    event: &LedgerEvent,
    expected_sequence: u64,
) -> Result<()> {
    if event.sequence != expected_sequence {
        return Err(Error::JournalCorrupted(format!(
            "expected sequence {}, found {}",
            expected_sequence, event.sequence
        )));
    }

    if let Some(public_key) = genesis.signer {
        if !event.verify_signature(&public_key) {
            return Err(Error::JournalCorrupted(format!(
                "bad signature on entry {}",
                event.sequence
            )));
        }
    }

    let receipt = core
        .execute(&event.caller, &event.operation, event.timestamp)
        .map_err(|e| {
            Error::JournalCorrupted(format!("entry {} does not replay: {}", event.sequence, e))
        })?;

    if let Receipt::Issued(record) = receipt {
        let stored = storage.get_mint_record(record.sequence_id)?;
        if stored.as_ref() != Some(&record) {
            return Err(Error::JournalCorrupted(format!(
                "audit record {} disagrees with journal entry {}",
                record.sequence_id, event.sequence
            )));
        }
    }

    Ok(())
}
