//! Journal storage using RocksDB
//!
//! # Column Families
//!
//! - `meta` - Genesis record (key: `genesis`)
//! - `journal` - Committed operations (key: sequence, big-endian)
//! - `mints` - Mint-audit records (key: sequence_id, big-endian)
//!
//! A journal entry and the audit record it creates are written in one
//! `WriteBatch`, so the two column families never disagree.

use crate::{
    config::StorageConfig,
    error::{Error, Result},
    types::{AccountId, Amount, LedgerEvent, MintRecord, TokenMetadata},
};
use chrono::{DateTime, Utc};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompressionType, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};
use serde::{Deserialize, Serialize};

/// Column family names
const CF_META: &str = "meta";
const CF_JOURNAL: &str = "journal";
const CF_MINTS: &str = "mints";

const GENESIS_KEY: &[u8] = b"genesis";

/// Parameters the ledger was created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    /// Deploying identity
    pub deployer: AccountId,
    /// Initial issue cap
    pub issue_cap: Amount,
    /// Token metadata
    pub metadata: TokenMetadata,
    /// Public key that signs every journal entry, if any
    pub signer: Option<[u8; 32]>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
    sync_writes: bool,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
            ColumnFamilyDescriptor::new(CF_JOURNAL, Self::cf_options_append_only()),
            ColumnFamilyDescriptor::new(CF_MINTS, Self::cf_options_append_only()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened journal storage");

        Ok(Self {
            db,
            sync_writes: config.sync_writes,
        })
    }

    fn cf_options_append_only() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(DBCompressionType::Zstd);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &opts)?;
        Ok(())
    }

    // Genesis

    /// Genesis record, if the ledger was created before
    pub fn load_genesis(&self) -> Result<Option<Genesis>> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(cf, GENESIS_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write the genesis record; refuses to overwrite an existing one
    pub fn put_genesis(&self, genesis: &Genesis) -> Result<()> {
        if self.load_genesis()?.is_some() {
            return Err(Error::Storage("Genesis already written".to_string()));
        }

        let cf = self.cf_handle(CF_META)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(cf, GENESIS_KEY, bincode::serialize(genesis)?);
        self.write(batch)
    }

    // Journal

    /// Append a journal entry and, for issues, its audit record (atomic)
    pub fn append(&self, event: &LedgerEvent, record: Option<&MintRecord>) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_journal = self.cf_handle(CF_JOURNAL)?;
        batch.put_cf(cf_journal, event.sequence.to_be_bytes(), bincode::serialize(event)?);

        if let Some(record) = record {
            let cf_mints = self.cf_handle(CF_MINTS)?;
            batch.put_cf(cf_mints, record.sequence_id.to_be_bytes(), bincode::serialize(record)?);
        }

        self.write(batch)?;

        tracing::debug!(
            sequence = event.sequence,
            event_id = %event.event_id,
            operation = event.operation.name(),
            "Journal entry appended"
        );

        Ok(())
    }

    /// All journal entries in sequence order
    pub fn events(&self) -> Result<Vec<LedgerEvent>> {
        let cf = self.cf_handle(CF_JOURNAL)?;
        let mut events = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            events.push(bincode::deserialize(&value)?);
        }
        Ok(events)
    }

    /// Journal entry by sequence
    pub fn get_event(&self, sequence: u64) -> Result<Option<LedgerEvent>> {
        let cf = self.cf_handle(CF_JOURNAL)?;
        match self.db.get_cf(cf, sequence.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stored audit record by sequence id
    pub fn get_mint_record(&self, sequence_id: u64) -> Result<Option<MintRecord>> {
        let cf = self.cf_handle(CF_MINTS)?;
        match self.db.get_cf(cf, sequence_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Highest journal sequence written (0 when empty)
    pub fn last_sequence(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_JOURNAL)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (_, value) = item?;
                let event: LedgerEvent = bincode::deserialize(&value)?;
                Ok(event.sequence)
            }
            None => Ok(0),
        }
    }

    /// Remove the journal column family so that appends fail
    #[cfg(test)]
    pub(crate) fn drop_journal(&mut self) -> Result<()> {
        self.db.drop_cf(CF_JOURNAL)?;
        Ok(())
    }

    /// Recreate an empty journal column family
    #[cfg(test)]
    pub(crate) fn restore_journal(&mut self) -> Result<()> {
        self.db.create_cf(CF_JOURNAL, &Self::cf_options_append_only())?;
        Ok(())
    }
}
