//! Ledger state machine
//!
//! `LedgerCore` owns every piece of ledger state and is the only place it is
//! mutated. Each operation checks all of its preconditions against `&self`
//! before touching anything, so a rejected call leaves no trace.
//!
//! # Invariants
//!
//! - Conservation: `total_supply == Σ balances`
//! - Non-negativity: debits never exceed the available balance
//! - Audit contiguity: record ids are `1..=mint_sequence`, in creation order
//! - Exactly one administrator

use crate::{
    error::{Error, Result},
    types::{
        AccountId, Amount, LedgerSnapshot, MintRecord, Mode, Operation, Receipt, TokenMetadata,
        MAX_METADATA_LEN,
    },
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// The ledger state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCore {
    metadata: TokenMetadata,
    balances: BTreeMap<AccountId, Amount>,
    total_supply: Amount,
    issuers: HashMap<AccountId, bool>,
    administrator: AccountId,
    owner: AccountId,
    paused: bool,
    issue_cap: Amount,
    mint_log: Vec<MintRecord>,
}

impl LedgerCore {
    /// Initialize a ledger deployed by `deployer`
    ///
    /// The deployer becomes administrator, sole issuer and the reserved owner.
    pub fn new(deployer: AccountId, issue_cap: Amount, metadata: TokenMetadata) -> Result<Self> {
        if issue_cap == 0 {
            return Err(Error::InvalidAmount);
        }

        let mut issuers = HashMap::new();
        issuers.insert(deployer.clone(), true);

        Ok(Self {
            metadata,
            balances: BTreeMap::new(),
            total_supply: 0,
            issuers,
            administrator: deployer.clone(),
            owner: deployer,
            paused: false,
            issue_cap,
            mint_log: Vec::new(),
        })
    }

    // Balance-mutating operations

    /// Move `amount` from `caller` to `recipient`
    pub fn transfer(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        self.check_transfer(caller, recipient, amount)?;

        self.debit(caller, amount);
        self.credit(recipient, amount);
        Ok(())
    }

    /// Create `amount` units for `recipient`, stamped with the current time
    pub fn issue(
        &mut self,
        caller: &AccountId,
        amount: Amount,
        recipient: &AccountId,
        metadata: &str,
    ) -> Result<&MintRecord> {
        self.issue_at(caller, amount, recipient, metadata, Utc::now())
    }

    /// Create `amount` units for `recipient` with an explicit timestamp
    pub fn issue_at(
        &mut self,
        caller: &AccountId,
        amount: Amount,
        recipient: &AccountId,
        metadata: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<&MintRecord> {
        self.check_issue(caller, amount, recipient, metadata)?;

        let record = self.next_mint_record(caller, amount, recipient, metadata, timestamp);
        self.credit(recipient, amount);
        self.total_supply += amount;
        self.mint_log.push(record);

        Ok(&self.mint_log[self.mint_log.len() - 1])
    }

    /// Destroy `amount` of the caller's units
    pub fn retire(&mut self, caller: &AccountId, amount: Amount) -> Result<()> {
        self.check_retire(caller, amount)?;

        self.debit(caller, amount);
        self.total_supply -= amount;
        Ok(())
    }

    // Administrative operations

    /// Enter paused mode (idempotent)
    pub fn pause(&mut self, caller: &AccountId) -> Result<()> {
        self.require_administrator(caller)?;
        self.paused = true;
        Ok(())
    }

    /// Leave paused mode (idempotent)
    pub fn resume(&mut self, caller: &AccountId) -> Result<()> {
        self.require_administrator(caller)?;
        self.paused = false;
        Ok(())
    }

    /// Replace the administrator
    pub fn set_administrator(&mut self, caller: &AccountId, new_admin: &AccountId) -> Result<()> {
        self.require_administrator(caller)?;
        self.administrator = new_admin.clone();
        Ok(())
    }

    /// Grant the issuer role
    pub fn add_issuer(&mut self, caller: &AccountId, account: &AccountId) -> Result<()> {
        self.check_add_issuer(caller, account)?;
        self.issuers.insert(account.clone(), true);
        Ok(())
    }

    /// Revoke the issuer role (idempotent)
    pub fn remove_issuer(&mut self, caller: &AccountId, account: &AccountId) -> Result<()> {
        self.require_administrator(caller)?;
        self.issuers.insert(account.clone(), false);
        Ok(())
    }

    /// Replace the per-call issue cap
    pub fn set_issue_cap(&mut self, caller: &AccountId, cap: Amount) -> Result<()> {
        self.check_set_issue_cap(caller, cap)?;
        self.issue_cap = cap;
        Ok(())
    }

    // Dispatch

    /// Check `operation` without applying it
    pub fn validate(&self, caller: &AccountId, operation: &Operation) -> Result<()> {
        match operation {
            Operation::Transfer { recipient, amount } => {
                self.check_transfer(caller, recipient, *amount)
            }
            Operation::Issue { amount, recipient, metadata } => {
                self.check_issue(caller, *amount, recipient, metadata)
            }
            Operation::Retire { amount } => self.check_retire(caller, *amount),
            Operation::AddIssuer { account } => self.check_add_issuer(caller, account),
            Operation::SetIssueCap { cap } => self.check_set_issue_cap(caller, *cap),
            Operation::Pause
            | Operation::Resume
            | Operation::SetAdministrator { .. }
            | Operation::RemoveIssuer { .. } => self.require_administrator(caller),
        }
    }

    /// Apply `operation` on behalf of `caller`
    ///
    /// `timestamp` stamps the audit record when the operation is an issue.
    pub fn execute(
        &mut self,
        caller: &AccountId,
        operation: &Operation,
        timestamp: DateTime<Utc>,
    ) -> Result<Receipt> {
        match operation {
            Operation::Transfer { recipient, amount } => {
                self.transfer(caller, recipient, *amount)?
            }
            Operation::Issue { amount, recipient, metadata } => {
                let record = self.issue_at(caller, *amount, recipient, metadata, timestamp)?;
                return Ok(Receipt::Issued(record.clone()));
            }
            Operation::Retire { amount } => self.retire(caller, *amount)?,
            Operation::Pause => self.pause(caller)?,
            Operation::Resume => self.resume(caller)?,
            Operation::SetAdministrator { new_admin } => self.set_administrator(caller, new_admin)?,
            Operation::AddIssuer { account } => self.add_issuer(caller, account)?,
            Operation::RemoveIssuer { account } => self.remove_issuer(caller, account)?,
            Operation::SetIssueCap { cap } => self.set_issue_cap(caller, *cap)?,
        }
        Ok(Receipt::Applied)
    }

    /// The audit record `operation` would append if executed now
    ///
    /// `None` for operations other than issue. Does not check preconditions.
    pub fn pending_mint_record(
        &self,
        caller: &AccountId,
        operation: &Operation,
        timestamp: DateTime<Utc>,
    ) -> Option<MintRecord> {
        match operation {
            Operation::Issue { amount, recipient, metadata } => Some(self.next_mint_record(
                caller, *amount, recipient, metadata, timestamp,
            )),
            _ => None,
        }
    }

    fn next_mint_record(
        &self,
        caller: &AccountId,
        amount: Amount,
        recipient: &AccountId,
        metadata: &str,
        timestamp: DateTime<Utc>,
    ) -> MintRecord {
        MintRecord {
            sequence_id: self.mint_sequence() + 1,
            amount,
            recipient: recipient.clone(),
            metadata: metadata.to_string(),
            issuer: caller.clone(),
            timestamp,
        }
    }

    // Read accessors

    /// Balance of `account` (0 if unknown)
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Total units in circulation
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Whether `account` currently holds the issuer role
    pub fn is_issuer(&self, account: &AccountId) -> bool {
        self.issuers.get(account).copied().unwrap_or(false)
    }

    /// Whether the ledger is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        if self.paused {
            Mode::Paused
        } else {
            Mode::Active
        }
    }

    /// Current administrator
    pub fn administrator(&self) -> &AccountId {
        &self.administrator
    }

    /// Deploying identity; never a valid issue recipient
    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    /// Per-call issue cap
    pub fn issue_cap(&self) -> Amount {
        self.issue_cap
    }

    /// Number of audit records created so far
    pub fn mint_sequence(&self) -> u64 {
        self.mint_log.len() as u64
    }

    /// Audit record by sequence id
    pub fn mint_record(&self, sequence_id: u64) -> Option<&MintRecord> {
        let index = sequence_id.checked_sub(1)?;
        self.mint_log.get(usize::try_from(index).ok()?)
    }

    /// All audit records in creation order
    pub fn mint_records(&self) -> &[MintRecord] {
        &self.mint_log
    }

    /// Accounts with a non-zero balance
    pub fn holders(&self) -> impl Iterator<Item = (&AccountId, Amount)> {
        self.balances.iter().map(|(account, amount)| (account, *amount))
    }

    /// Token metadata
    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    /// Token name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Token symbol
    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    /// Decimal precision
    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    /// Point-in-time summary
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            metadata: self.metadata.clone(),
            total_supply: self.total_supply,
            mode: self.mode(),
            administrator: self.administrator.clone(),
            owner: self.owner.clone(),
            issue_cap: self.issue_cap,
            mint_sequence: self.mint_sequence(),
            holders: self
                .holders()
                .map(|(account, amount)| (account.clone(), amount))
                .collect(),
        }
    }

    /// Recompute conservation and audit contiguity
    pub fn check_invariants(&self) -> Result<()> {
        let mut sum: u128 = 0;
        for amount in self.balances.values() {
            if *amount == 0 {
                return Err(Error::InvariantViolation(
                    "zero balance stored in balance map".to_string(),
                ));
            }
            sum += u128::from(*amount);
        }
        if sum != u128::from(self.total_supply) {
            return Err(Error::InvariantViolation(format!(
                "total supply {} != sum of balances {}",
                self.total_supply, sum
            )));
        }

        for (index, record) in self.mint_log.iter().enumerate() {
            let expected = index as u64 + 1;
            if record.sequence_id != expected {
                return Err(Error::InvariantViolation(format!(
                    "audit record at position {} has id {}, expected {}",
                    index, record.sequence_id, expected
                )));
            }
        }

        Ok(())
    }

    // Precondition checks, in the documented order

    fn require_administrator(&self, caller: &AccountId) -> Result<()> {
        if caller != &self.administrator {
            return Err(Error::Unauthorized);
        }
        Ok(())
    }

    fn require_active(&self) -> Result<()> {
        if self.paused {
            return Err(Error::Paused);
        }
        Ok(())
    }

    fn require_balance(&self, account: &AccountId, amount: Amount) -> Result<()> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(Error::InsufficientBalance {
                available,
                required: amount,
            });
        }
        Ok(())
    }

    fn check_transfer(
        &self,
        caller: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        self.require_active()?;
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        self.require_balance(caller, amount)?;
        if recipient == caller {
            return Err(Error::InvalidRecipient);
        }
        Ok(())
    }

    fn check_issue(
        &self,
        caller: &AccountId,
        amount: Amount,
        recipient: &AccountId,
        metadata: &str,
    ) -> Result<()> {
        self.require_active()?;
        if !self.is_issuer(caller) {
            return Err(Error::NotIssuer);
        }
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }
        // Supply overflow counts as a limit breach.
        if amount > self.issue_cap || self.total_supply.checked_add(amount).is_none() {
            return Err(Error::IssueLimitExceeded {
                amount,
                cap: self.issue_cap,
            });
        }
        let len = metadata.chars().count();
        if len > MAX_METADATA_LEN {
            return Err(Error::MetadataTooLong {
                len,
                max: MAX_METADATA_LEN,
            });
        }
        if recipient == &self.owner {
            return Err(Error::InvalidRecipient);
        }
        Ok(())
    }

    fn check_retire(&self, caller: &AccountId, amount: Amount) -> Result<()> {
        self.require_active()?;
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }
        self.require_balance(caller, amount)
    }

    fn check_add_issuer(&self, caller: &AccountId, account: &AccountId) -> Result<()> {
        self.require_administrator(caller)?;
        if self.is_issuer(account) {
            return Err(Error::AlreadyRegistered);
        }
        Ok(())
    }

    fn check_set_issue_cap(&self, caller: &AccountId, cap: Amount) -> Result<()> {
        self.require_administrator(caller)?;
        if cap == 0 {
            return Err(Error::InvalidAmount);
        }
        Ok(())
    }

    // Raw balance updates; callers have already checked preconditions

    fn credit(&mut self, account: &AccountId, amount: Amount) {
        // Bounded by total supply, which was checked for overflow at issue time.
        *self.balances.entry(account.clone()).or_insert(0) += amount;
    }

    fn debit(&mut self, account: &AccountId, amount: Amount) {
        if let Some(balance) = self.balances.get_mut(account) {
            *balance -= amount;
            if *balance == 0 {
                self.balances.remove(account);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_ISSUE_CAP;

    fn deployer() -> AccountId {
        AccountId::new("deployer")
    }

    fn user(name: &str) -> AccountId {
        AccountId::new(name)
    }

    fn new_core() -> LedgerCore {
        LedgerCore::new(deployer(), DEFAULT_ISSUE_CAP, TokenMetadata::default()).unwrap()
    }

    /// Core with an extra issuer `issuer` and `alice` holding 1_000_000
    fn funded_core() -> LedgerCore {
        let mut core = new_core();
        core.add_issuer(&deployer(), &user("issuer")).unwrap();
        core.issue(&user("issuer"), 1_000_000, &user("alice"), "reward").unwrap();
        core
    }

    #[test]
    fn test_initial_state() {
        let core = new_core();
        assert_eq!(core.administrator(), &deployer());
        assert_eq!(core.owner(), &deployer());
        assert!(core.is_issuer(&deployer()));
        assert!(!core.is_paused());
        assert_eq!(core.mode(), Mode::Active);
        assert_eq!(core.total_supply(), 0);
        assert_eq!(core.mint_sequence(), 0);
        assert_eq!(core.issue_cap(), DEFAULT_ISSUE_CAP);
        assert_eq!(core.name(), "Reward Token");
        assert_eq!(core.symbol(), "RWD");
        assert_eq!(core.decimals(), 6);
        assert!(core.mint_record(1).is_none());
    }

    #[test]
    fn test_zero_initial_cap_rejected() {
        let result = LedgerCore::new(deployer(), 0, TokenMetadata::default());
        assert!(matches!(result, Err(Error::InvalidAmount)));
    }

    #[test]
    fn test_issue_credits_and_records() {
        let mut core = new_core();
        let record = core
            .issue(&deployer(), 1_000_000, &user("alice"), "reward")
            .unwrap()
            .clone();

        assert_eq!(record.sequence_id, 1);
        assert_eq!(record.amount, 1_000_000);
        assert_eq!(record.recipient, user("alice"));
        assert_eq!(record.metadata, "reward");
        assert_eq!(record.issuer, deployer());

        assert_eq!(core.balance_of(&user("alice")), 1_000_000);
        assert_eq!(core.total_supply(), 1_000_000);
        assert_eq!(core.mint_record(1), Some(&record));
        core.check_invariants().unwrap();
    }

    #[test]
    fn test_issue_cap_exceeded() {
        let mut core = new_core();
        core.set_issue_cap(&deployer(), 1_000_000).unwrap();
        let before = core.clone();

        let result = core.issue(&deployer(), 1_000_001, &user("alice"), "reward");
        assert!(matches!(
            result,
            Err(Error::IssueLimitExceeded { amount: 1_000_001, cap: 1_000_000 })
        ));
        assert_eq!(core, before);

        // Exactly at the cap is accepted
        core.issue(&deployer(), 1_000_000, &user("alice"), "reward").unwrap();
    }

    #[test]
    fn test_issue_error_order() {
        let mut core = new_core();
        let outsider = user("outsider");
        let long = "x".repeat(MAX_METADATA_LEN + 1);

        // Paused wins over everything
        core.pause(&deployer()).unwrap();
        assert!(matches!(core.issue(&outsider, 0, &deployer(), &long), Err(Error::Paused)));
        core.resume(&deployer()).unwrap();

        assert!(matches!(core.issue(&outsider, 0, &deployer(), &long), Err(Error::NotIssuer)));
        assert!(matches!(
            core.issue(&deployer(), 0, &deployer(), &long),
            Err(Error::InvalidAmount)
        ));
        assert!(matches!(
            core.issue(&deployer(), DEFAULT_ISSUE_CAP + 1, &deployer(), &long),
            Err(Error::IssueLimitExceeded { .. })
        ));
        assert!(matches!(
            core.issue(&deployer(), 1, &deployer(), &long),
            Err(Error::MetadataTooLong { len: 501, max: 500 })
        ));
        assert!(matches!(
            core.issue(&deployer(), 1, &deployer(), "ok"),
            Err(Error::InvalidRecipient)
        ));
        assert_eq!(core.mint_sequence(), 0);
    }

    #[test]
    fn test_metadata_bound_counts_characters() {
        let mut core = new_core();
        let at_limit = "é".repeat(MAX_METADATA_LEN);
        core.issue(&deployer(), 1, &user("alice"), &at_limit).unwrap();
        assert_eq!(core.mint_record(1).unwrap().metadata, at_limit);
    }

    #[test]
    fn test_issue_to_owner_rejected_after_admin_handover() {
        let mut core = new_core();
        core.set_administrator(&deployer(), &user("new-admin")).unwrap();

        // The reserved owner stays the deployer
        let result = core.issue(&deployer(), 10, &deployer(), "self");
        assert!(matches!(result, Err(Error::InvalidRecipient)));

        // The new administrator is not reserved
        core.issue(&deployer(), 10, &user("new-admin"), "ok").unwrap();
    }

    #[test]
    fn test_issue_supply_overflow_rejected() {
        let mut core = LedgerCore::new(deployer(), Amount::MAX, TokenMetadata::default()).unwrap();
        core.issue(&deployer(), Amount::MAX, &user("alice"), "").unwrap();

        let result = core.issue(&deployer(), 1, &user("bob"), "");
        assert!(matches!(result, Err(Error::IssueLimitExceeded { .. })));
        assert_eq!(core.total_supply(), Amount::MAX);
        core.check_invariants().unwrap();
    }

    #[test]
    fn test_transfer() {
        let mut core = funded_core();
        core.transfer(&user("alice"), &user("bob"), 500_000).unwrap();

        assert_eq!(core.balance_of(&user("alice")), 500_000);
        assert_eq!(core.balance_of(&user("bob")), 500_000);
        assert_eq!(core.total_supply(), 1_000_000);
        core.check_invariants().unwrap();
    }

    #[test]
    fn test_transfer_full_balance_removes_entry() {
        let mut core = funded_core();
        core.transfer(&user("alice"), &user("bob"), 1_000_000).unwrap();

        assert_eq!(core.balance_of(&user("alice")), 0);
        assert_eq!(core.holders().count(), 1);
        core.check_invariants().unwrap();
    }

    #[test]
    fn test_transfer_error_order() {
        let mut core = funded_core();
        let alice = user("alice");
        let before = core.clone();

        assert!(matches!(core.transfer(&alice, &user("bob"), 0), Err(Error::ZeroAmount)));
        assert!(matches!(
            core.transfer(&alice, &user("bob"), 1_000_001),
            Err(Error::InsufficientBalance { available: 1_000_000, required: 1_000_001 })
        ));
        // Insufficient balance is checked before self-transfer
        assert!(matches!(
            core.transfer(&alice, &alice, 2_000_000),
            Err(Error::InsufficientBalance { .. })
        ));
        assert!(matches!(core.transfer(&alice, &alice, 1), Err(Error::InvalidRecipient)));

        core.pause(&deployer()).unwrap();
        assert!(matches!(core.transfer(&alice, &alice, 0), Err(Error::Paused)));
        core.resume(&deployer()).unwrap();

        assert_eq!(core, before);
    }

    #[test]
    fn test_unknown_account_transfer_rejected() {
        let mut core = funded_core();
        let result = core.transfer(&user("nobody"), &user("alice"), 1);
        assert!(matches!(
            result,
            Err(Error::InsufficientBalance { available: 0, required: 1 })
        ));
    }

    #[test]
    fn test_retire() {
        let mut core = funded_core();
        core.retire(&user("alice"), 400_000).unwrap();

        assert_eq!(core.balance_of(&user("alice")), 600_000);
        assert_eq!(core.total_supply(), 600_000);
        core.check_invariants().unwrap();

        assert!(matches!(core.retire(&user("alice"), 0), Err(Error::InvalidAmount)));
        assert!(matches!(
            core.retire(&user("alice"), 600_001),
            Err(Error::InsufficientBalance { .. })
        ));

        core.retire(&user("alice"), 600_000).unwrap();
        assert_eq!(core.total_supply(), 0);
        assert_eq!(core.holders().count(), 0);
    }

    #[test]
    fn test_pause_gating() {
        let mut core = funded_core();
        core.pause(&deployer()).unwrap();
        assert_eq!(core.mode(), Mode::Paused);

        assert!(matches!(core.transfer(&user("alice"), &user("bob"), 1), Err(Error::Paused)));
        assert!(matches!(core.issue(&user("issuer"), 1, &user("bob"), ""), Err(Error::Paused)));
        assert!(matches!(core.retire(&user("alice"), 1), Err(Error::Paused)));

        // Administration still works while paused
        core.add_issuer(&deployer(), &user("second")).unwrap();
        core.set_issue_cap(&deployer(), 5).unwrap();
        assert_eq!(core.balance_of(&user("alice")), 1_000_000);

        // Idempotent
        core.pause(&deployer()).unwrap();
        core.resume(&deployer()).unwrap();
        core.resume(&deployer()).unwrap();
        assert_eq!(core.mode(), Mode::Active);

        core.transfer(&user("alice"), &user("bob"), 1).unwrap();
        core.issue(&user("issuer"), 1, &user("bob"), "").unwrap();
        core.retire(&user("alice"), 1).unwrap();
    }

    #[test]
    fn test_admin_operations_require_administrator() {
        let mut core = new_core();
        let outsider = user("outsider");
        let before = core.clone();

        assert!(matches!(core.pause(&outsider), Err(Error::Unauthorized)));
        assert!(matches!(core.resume(&outsider), Err(Error::Unauthorized)));
        assert!(matches!(core.set_administrator(&outsider, &outsider), Err(Error::Unauthorized)));
        // Unauthorized is checked before AlreadyRegistered / InvalidAmount
        assert!(matches!(core.add_issuer(&outsider, &deployer()), Err(Error::Unauthorized)));
        assert!(matches!(core.remove_issuer(&outsider, &deployer()), Err(Error::Unauthorized)));
        assert!(matches!(core.set_issue_cap(&outsider, 0), Err(Error::Unauthorized)));

        assert_eq!(core, before);
    }

    #[test]
    fn test_issuer_management() {
        let mut core = new_core();
        let issuer = user("issuer");

        core.add_issuer(&deployer(), &issuer).unwrap();
        assert!(core.is_issuer(&issuer));
        assert!(matches!(core.add_issuer(&deployer(), &issuer), Err(Error::AlreadyRegistered)));

        core.remove_issuer(&deployer(), &issuer).unwrap();
        assert!(!core.is_issuer(&issuer));
        core.remove_issuer(&deployer(), &issuer).unwrap();
        core.remove_issuer(&deployer(), &user("never-added")).unwrap();

        assert!(matches!(core.issue(&issuer, 1, &user("bob"), ""), Err(Error::NotIssuer)));

        // Re-adding after removal is allowed
        core.add_issuer(&deployer(), &issuer).unwrap();
        core.issue(&issuer, 1, &user("bob"), "").unwrap();
    }

    #[test]
    fn test_administrator_handover() {
        let mut core = new_core();
        let next = user("next");

        core.set_administrator(&deployer(), &next).unwrap();
        assert_eq!(core.administrator(), &next);
        assert!(matches!(core.pause(&deployer()), Err(Error::Unauthorized)));
        core.pause(&next).unwrap();

        // Handover does not touch the issuer set
        assert!(core.is_issuer(&deployer()));
        assert!(!core.is_issuer(&next));
    }

    #[test]
    fn test_set_issue_cap() {
        let mut core = new_core();
        assert!(matches!(core.set_issue_cap(&deployer(), 0), Err(Error::InvalidAmount)));
        assert_eq!(core.issue_cap(), DEFAULT_ISSUE_CAP);

        core.set_issue_cap(&deployer(), 42).unwrap();
        assert_eq!(core.issue_cap(), 42);
    }

    #[test]
    fn test_audit_contiguity() {
        let mut core = new_core();
        for i in 1..=5u64 {
            core.issue(&deployer(), i * 10, &user("alice"), &format!("batch-{}", i)).unwrap();
        }
        // A rejected issue does not consume a sequence id
        let _ = core.issue(&deployer(), 0, &user("alice"), "");
        core.issue(&deployer(), 60, &user("bob"), "batch-6").unwrap();

        assert_eq!(core.mint_sequence(), 6);
        let ids: Vec<u64> = core.mint_records().iter().map(|r| r.sequence_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(core.mint_record(3).unwrap().amount, 30);
        assert!(core.mint_record(0).is_none());
        assert!(core.mint_record(7).is_none());
        core.check_invariants().unwrap();
    }

    #[test]
    fn test_validate_matches_execute() {
        let core = funded_core();
        let alice = user("alice");
        let cases = vec![
            (alice.clone(), Operation::Transfer { recipient: alice.clone(), amount: 1 }),
            (alice.clone(), Operation::Transfer { recipient: user("bob"), amount: 1 }),
            (alice.clone(), Operation::Retire { amount: 2_000_000 }),
            (alice.clone(), Operation::Pause),
            (deployer(), Operation::AddIssuer { account: user("issuer") }),
            (deployer(), Operation::SetIssueCap { cap: 0 }),
            (
                user("issuer"),
                Operation::Issue { amount: 5, recipient: deployer(), metadata: String::new() },
            ),
        ];

        for (caller, operation) in cases {
            let validated = core.validate(&caller, &operation).map_err(|e| e.kind());
            let mut scratch = core.clone();
            let executed = scratch
                .execute(&caller, &operation, Utc::now())
                .map(|_| ())
                .map_err(|e| e.kind());
            assert_eq!(validated, executed, "mismatch for {:?}", operation);
        }
    }

    #[test]
    fn test_execute_issue_returns_record() {
        let mut core = new_core();
        let timestamp = Utc::now();
        let receipt = core
            .execute(
                &deployer(),
                &Operation::Issue {
                    amount: 7,
                    recipient: user("alice"),
                    metadata: "grant".to_string(),
                },
                timestamp,
            )
            .unwrap();

        match receipt {
            Receipt::Issued(record) => {
                assert_eq!(record.sequence_id, 1);
                assert_eq!(record.timestamp, timestamp);
            }
            other => panic!("unexpected receipt {:?}", other),
        }

        let receipt = core.execute(&deployer(), &Operation::Pause, timestamp).unwrap();
        assert_eq!(receipt, Receipt::Applied);
    }

    #[test]
    fn test_pending_mint_record_matches_issue() {
        let mut core = funded_core();
        let timestamp = Utc::now();
        let operation = Operation::Issue {
            amount: 250,
            recipient: user("bob"),
            metadata: "bounty".to_string(),
        };

        let pending = core.pending_mint_record(&user("issuer"), &operation, timestamp).unwrap();
        let receipt = core.execute(&user("issuer"), &operation, timestamp).unwrap();
        assert_eq!(receipt, Receipt::Issued(pending));
        assert!(core.pending_mint_record(&deployer(), &Operation::Pause, timestamp).is_none());
    }

    #[test]
    fn test_snapshot() {
        let core = funded_core();
        let snapshot = core.snapshot();
        assert_eq!(snapshot.total_supply, 1_000_000);
        assert_eq!(snapshot.mint_sequence, 1);
        assert_eq!(snapshot.holders, vec![(user("alice"), 1_000_000)]);
        assert_eq!(snapshot.mode, Mode::Active);
    }
}
