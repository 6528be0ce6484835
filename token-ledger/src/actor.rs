//! Actor-based concurrency for the ledger
//!
//! Every call, read or write, goes through one Tokio task that owns the
//! `LedgerCore`. The mailbox gives a total order over calls from any number
//! of cloned `LedgerHandle`s; each message runs to completion before the
//! next one is received.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │        Collaborators (reward pools, escrow, ...)     │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                   │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)               │
//! │  validate → journal (RocksDB) → apply (LedgerCore)   │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::{
    crypto::{hash_mint_record, KeyPair},
    merkle::{MerkleProof, MerkleTree},
    metrics::Metrics,
    state::LedgerCore,
    storage::Storage,
    types::{
        AccountId, Amount, LedgerEvent, LedgerSnapshot, MintRecord, Operation, Receipt, Signature,
        TokenMetadata,
    },
    Error, Result,
};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Run a mutating operation
    Execute {
        caller: AccountId,
        operation: Operation,
        response: oneshot::Sender<Result<Receipt>>,
    },

    /// Balance of an account
    BalanceOf {
        account: AccountId,
        response: oneshot::Sender<Amount>,
    },

    /// Total supply
    TotalSupply {
        response: oneshot::Sender<Amount>,
    },

    /// Issuer membership
    IsIssuer {
        account: AccountId,
        response: oneshot::Sender<bool>,
    },

    /// Pause flag
    IsPaused {
        response: oneshot::Sender<bool>,
    },

    /// Current administrator
    Administrator {
        response: oneshot::Sender<AccountId>,
    },

    /// Audit record by id
    GetMintRecord {
        sequence_id: u64,
        response: oneshot::Sender<Option<MintRecord>>,
    },

    /// Token metadata
    Metadata {
        response: oneshot::Sender<TokenMetadata>,
    },

    /// Point-in-time summary
    Snapshot {
        response: oneshot::Sender<LedgerSnapshot>,
    },

    /// Merkle root over the audit log
    AuditRoot {
        response: oneshot::Sender<[u8; 32]>,
    },

    /// Inclusion proof for an audit record
    AuditProof {
        sequence_id: u64,
        response: oneshot::Sender<Option<MerkleProof>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the ledger state
pub struct LedgerActor {
    core: LedgerCore,
    storage: Option<Storage>,
    keypair: Option<KeyPair>,
    audit_tree: MerkleTree,
    metrics: Metrics,
    next_sequence: u64,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    ///
    /// `core` must already reflect every entry in `storage`'s journal, whose
    /// last sequence is `last_sequence`.
    pub fn new(
        core: LedgerCore,
        storage: Option<Storage>,
        keypair: Option<KeyPair>,
        metrics: Metrics,
        last_sequence: u64,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Result<Self> {
        let mut audit_tree = MerkleTree::new();
        for record in core.mint_records() {
            audit_tree.append(hash_mint_record(record)?);
        }

        metrics.update_state(core.total_supply(), core.mint_sequence(), core.is_paused());

        Ok(Self {
            core,
            storage,
            keypair,
            audit_tree,
            metrics,
            next_sequence: last_sequence + 1,
            mailbox,
        })
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if let LedgerMessage::Shutdown = msg {
                tracing::info!("Ledger actor shutting down");
                break;
            }
            self.handle_message(msg);
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Execute {
                caller,
                operation,
                response,
            } => {
                let result = self.execute(caller, operation);
                let _ = response.send(result);
            }

            LedgerMessage::BalanceOf { account, response } => {
                let _ = response.send(self.core.balance_of(&account));
            }

            LedgerMessage::TotalSupply { response } => {
                let _ = response.send(self.core.total_supply());
            }

            LedgerMessage::IsIssuer { account, response } => {
                let _ = response.send(self.core.is_issuer(&account));
            }

            LedgerMessage::IsPaused { response } => {
                let _ = response.send(self.core.is_paused());
            }

            LedgerMessage::Administrator { response } => {
                let _ = response.send(self.core.administrator().clone());
            }

            LedgerMessage::GetMintRecord {
                sequence_id,
                response,
            } => {
                let _ = response.send(self.core.mint_record(sequence_id).cloned());
            }

            LedgerMessage::Metadata { response } => {
                let _ = response.send(self.core.metadata().clone());
            }

            LedgerMessage::Snapshot { response } => {
                let _ = response.send(self.core.snapshot());
            }

            LedgerMessage::AuditRoot { response } => {
                let _ = response.send(self.audit_tree.root());
            }

            LedgerMessage::AuditProof {
                sequence_id,
                response,
            } => {
                let proof = sequence_id
                    .checked_sub(1)
                    .and_then(|index| usize::try_from(index).ok())
                    .and_then(|index| self.audit_tree.generate_proof(index));
                let _ = response.send(proof);
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    /// Validate, journal, then apply one operation
    fn execute(&mut self, caller: AccountId, operation: Operation) -> Result<Receipt> {
        if let Err(err) = self.core.validate(&caller, &operation) {
            tracing::warn!(
                caller = %caller,
                operation = operation.name(),
                error = %err,
                "Operation rejected"
            );
            self.metrics.record_rejection(err.kind());
            return Err(err);
        }

        let timestamp = Utc::now();
        let pending_record = self.core.pending_mint_record(&caller, &operation, timestamp);

        let mut event = LedgerEvent {
            sequence: self.next_sequence,
            event_id: Uuid::now_v7(),
            caller,
            operation,
            timestamp,
            signature: Signature::empty(),
        };
        if let Some(ref keypair) = self.keypair {
            keypair.sign_event(&mut event)?;
        }

        // Journal first: in-memory state only moves once the entry is durable.
        if let Some(ref storage) = self.storage {
            storage.append(&event, pending_record.as_ref())?;
        }
        self.next_sequence += 1;

        let receipt = self
            .core
            .execute(&event.caller, &event.operation, timestamp)
            .map_err(|err| {
                Error::InvariantViolation(format!(
                    "validated operation {} failed to apply: {}",
                    event.sequence, err
                ))
            })?;

        if let Receipt::Issued(ref record) = receipt {
            self.audit_tree.append(hash_mint_record(record)?);
        }

        self.log_committed(&event);
        self.metrics.record_operation(event.operation.name());
        self.metrics.update_state(
            self.core.total_supply(),
            self.core.mint_sequence(),
            self.core.is_paused(),
        );

        Ok(receipt)
    }

    fn log_committed(&self, event: &LedgerEvent) {
        match &event.operation {
            Operation::Transfer { recipient, amount } => tracing::debug!(
                sequence = event.sequence,
                caller = %event.caller,
                recipient = %recipient,
                amount,
                "Transfer committed"
            ),
            Operation::Retire { amount } => tracing::debug!(
                sequence = event.sequence,
                caller = %event.caller,
                amount,
                "Retire committed"
            ),
            Operation::Issue {
                amount, recipient, ..
            } => tracing::info!(
                sequence = event.sequence,
                issuer = %event.caller,
                recipient = %recipient,
                amount,
                mint_sequence = self.core.mint_sequence(),
                total_supply = self.core.total_supply(),
                "Issue committed"
            ),
            other => tracing::info!(
                sequence = event.sequence,
                caller = %event.caller,
                operation = other.name(),
                "Administrative operation committed"
            ),
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Send a message carrying a reply channel and await the reply
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Run a mutating operation
    pub async fn execute(&self, caller: AccountId, operation: Operation) -> Result<Receipt> {
        self.request(|response| LedgerMessage::Execute {
            caller,
            operation,
            response,
        })
        .await?
    }

    /// Balance of an account
    pub async fn balance_of(&self, account: AccountId) -> Result<Amount> {
        self.request(|response| LedgerMessage::BalanceOf { account, response })
            .await
    }

    /// Total supply
    pub async fn total_supply(&self) -> Result<Amount> {
        self.request(|response| LedgerMessage::TotalSupply { response })
            .await
    }

    /// Issuer membership
    pub async fn is_issuer(&self, account: AccountId) -> Result<bool> {
        self.request(|response| LedgerMessage::IsIssuer { account, response })
            .await
    }

    /// Pause flag
    pub async fn is_paused(&self) -> Result<bool> {
        self.request(|response| LedgerMessage::IsPaused { response })
            .await
    }

    /// Current administrator
    pub async fn administrator(&self) -> Result<AccountId> {
        self.request(|response| LedgerMessage::Administrator { response })
            .await
    }

    /// Audit record by id
    pub async fn mint_record(&self, sequence_id: u64) -> Result<Option<MintRecord>> {
        self.request(|response| LedgerMessage::GetMintRecord {
            sequence_id,
            response,
        })
        .await
    }

    /// Token metadata
    pub async fn metadata(&self) -> Result<TokenMetadata> {
        self.request(|response| LedgerMessage::Metadata { response })
            .await
    }

    /// Point-in-time summary
    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.request(|response| LedgerMessage::Snapshot { response })
            .await
    }

    /// Merkle root over the audit log
    pub async fn audit_root(&self) -> Result<[u8; 32]> {
        self.request(|response| LedgerMessage::AuditRoot { response })
            .await
    }

    /// Inclusion proof for an audit record
    pub async fn audit_proof(&self, sequence_id: u64) -> Result<Option<MerkleProof>> {
        self.request(|response| LedgerMessage::AuditProof {
            sequence_id,
            response,
        })
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    core: LedgerCore,
    storage: Option<Storage>,
    keypair: Option<KeyPair>,
    metrics: Metrics,
    last_sequence: u64,
    mailbox_capacity: usize,
) -> Result<(LedgerHandle, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(core, storage, keypair, metrics, last_sequence, rx)?;

    let join = tokio::spawn(async move {
        actor.run().await;
    });

    Ok((LedgerHandle::new(tx), join))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::types::DEFAULT_ISSUE_CAP;

    fn deployer() -> AccountId {
        AccountId::new("deployer")
    }

    fn spawn_in_memory() -> (LedgerHandle, JoinHandle<()>, Metrics) {
        let core =
            LedgerCore::new(deployer(), DEFAULT_ISSUE_CAP, TokenMetadata::default()).unwrap();
        let metrics = Metrics::new().unwrap();
        let (handle, join) = spawn_ledger_actor(core, None, None, metrics.clone(), 0, 16).unwrap();
        (handle, join, metrics)
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (handle, join, _) = spawn_in_memory();
        handle.shutdown().await.unwrap();
        join.await.unwrap();

        // Calls after shutdown surface as concurrency errors
        let result = handle.total_supply().await;
        assert!(matches!(result, Err(Error::Concurrency(_))));
    }

    #[tokio::test]
    async fn test_actor_execute_and_read() {
        let (handle, join, metrics) = spawn_in_memory();
        let alice = AccountId::new("alice");

        let receipt = handle
            .execute(
                deployer(),
                Operation::Issue {
                    amount: 1_000,
                    recipient: alice.clone(),
                    metadata: "reward".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(receipt, Receipt::Issued(ref record) if record.sequence_id == 1));

        assert_eq!(handle.balance_of(alice.clone()).await.unwrap(), 1_000);
        assert_eq!(handle.total_supply().await.unwrap(), 1_000);
        assert_eq!(handle.mint_record(1).await.unwrap().unwrap().recipient, alice);
        assert!(handle.mint_record(2).await.unwrap().is_none());

        assert_eq!(metrics.operations_total.with_label_values(&["issue"]).get(), 1);
        assert_eq!(metrics.total_supply.get(), 1_000);

        handle.shutdown().await.unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_rejection_counted() {
        let (handle, join, metrics) = spawn_in_memory();

        let result = handle
            .execute(AccountId::new("outsider"), Operation::Pause)
            .await;
        assert!(matches!(result, Err(Error::Unauthorized)));
        assert!(!handle.is_paused().await.unwrap());
        assert_eq!(metrics.rejections_total.with_label_values(&["unauthorized"]).get(), 1);

        handle.shutdown().await.unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn test_audit_proofs() {
        let (handle, join, _) = spawn_in_memory();
        assert_eq!(handle.audit_root().await.unwrap(), [0u8; 32]);

        for i in 1..=3u64 {
            handle
                .execute(
                    deployer(),
                    Operation::Issue {
                        amount: i,
                        recipient: AccountId::new("alice"),
                        metadata: format!("grant-{}", i),
                    },
                )
                .await
                .unwrap();
        }

        let root = handle.audit_root().await.unwrap();
        for id in 1..=3u64 {
            let record = handle.mint_record(id).await.unwrap().unwrap();
            let proof = handle.audit_proof(id).await.unwrap().unwrap();
            assert_eq!(proof.root_hash, root);
            assert_eq!(proof.leaf_hash, hash_mint_record(&record).unwrap());
            assert!(proof.verify());
        }
        assert!(handle.audit_proof(0).await.unwrap().is_none());
        assert!(handle.audit_proof(4).await.unwrap().is_none());

        handle.shutdown().await.unwrap();
        join.await.unwrap();
    }

    #[test]
    fn test_storage_failure_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            enabled: true,
            data_dir: dir.path().to_path_buf(),
            sync_writes: false,
            ..StorageConfig::default()
        };
        let storage = Storage::open(&config).unwrap();
        let core =
            LedgerCore::new(deployer(), DEFAULT_ISSUE_CAP, TokenMetadata::default()).unwrap();
        let (_tx, rx) = mpsc::channel(1);
        let mut actor =
            LedgerActor::new(core, Some(storage), None, Metrics::new().unwrap(), 0, rx).unwrap();

        let alice = AccountId::new("alice");
        let issue = |amount| Operation::Issue {
            amount,
            recipient: alice.clone(),
            metadata: "grant".to_string(),
        };
        actor.execute(deployer(), issue(100)).unwrap();

        let core_before = actor.core.clone();
        let root_before = actor.audit_tree.root();

        actor.storage.as_mut().unwrap().drop_journal().unwrap();
        let result = actor.execute(deployer(), issue(50));
        assert!(matches!(result, Err(Error::Storage(_))));

        assert_eq!(actor.core, core_before);
        assert_eq!(actor.core.balance_of(&alice), 100);
        assert_eq!(actor.core.total_supply(), 100);
        assert_eq!(actor.core.mint_sequence(), 1);
        assert_eq!(actor.audit_tree.len(), 1);
        assert_eq!(actor.audit_tree.root(), root_before);
        assert_eq!(actor.next_sequence, 2);

        // Once the journal is writable again numbering resumes without a gap
        actor.storage.as_mut().unwrap().restore_journal().unwrap();
        actor
            .execute(
                alice.clone(),
                Operation::Transfer {
                    recipient: AccountId::new("bob"),
                    amount: 40,
                },
            )
            .unwrap();
        assert_eq!(actor.next_sequence, 3);

        let storage = actor.storage.as_ref().unwrap();
        assert_eq!(storage.get_event(2).unwrap().unwrap().sequence, 2);
        assert!(storage.get_mint_record(2).unwrap().is_none());
    }
}
