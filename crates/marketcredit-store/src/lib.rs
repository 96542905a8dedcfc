//! `RocksDB` storage layer for the marketcredit ledger.
//!
//! This crate provides persistent storage for credit accounts, ledger
//! entries, and plan instances using `RocksDB` with column families for
//! efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `accounts`: Primary account records, keyed by `account_id`
//! - `transactions`: Ledger entries, keyed by `transaction_id` (ULID)
//! - `transactions_by_account`: Index for listing entries by account
//! - `plan_instances`: Plan instances, keyed by `instance_id` (ULID)
//! - `instances_by_account`: Index for listing instances by account
//!
//! Compound operations (`apply_ledger`, `apply_plan_change`) write all rows
//! through a single `WriteBatch`, which is what makes a ledger debit or a
//! plan activation all-or-nothing.
//!
//! # Example
//!
//! ```no_run
//! use marketcredit_store::{RocksStore, Store};
//! use marketcredit_core::{AccountId, CreditAccount};
//!
//! let store = RocksStore::open("/tmp/marketcredit-db").unwrap();
//!
//! let account_id = AccountId::generate();
//! let account = CreditAccount::new(account_id);
//! store.put_account(&account).unwrap();
//!
//! let retrieved = store.get_account(&account_id).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use marketcredit_core::{
    AccountId, CreditAccount, CreditTransaction, PlanInstance, PlanInstanceId, TransactionId,
};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations. All mutating compound operations must be atomic: either
/// every row in the operation is persisted or none is.
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert or update an account record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &CreditAccount) -> Result<()>;

    /// Get an account by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<CreditAccount>>;

    // =========================================================================
    // Ledger Entry Operations
    // =========================================================================

    /// Get a ledger entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>>;

    /// List ledger entries for an account, ordered by time (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    // =========================================================================
    // Plan Instance Operations
    // =========================================================================

    /// Get a plan instance by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_plan_instance(&self, instance_id: &PlanInstanceId) -> Result<Option<PlanInstance>>;

    /// List all plan instances for an account, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_instances_by_account(&self, account_id: &AccountId) -> Result<Vec<PlanInstance>>;

    /// Get the account's active instance, if any.
    ///
    /// At most one instance per account is active; the store returns the
    /// first active one it finds.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn active_instance(&self, account_id: &AccountId) -> Result<Option<PlanInstance>>;

    /// Get the account's oldest reserved instance, if any.
    ///
    /// Reserved instances activate in purchase order, which the ULID-keyed
    /// index provides naturally.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn reserved_instance(&self, account_id: &AccountId) -> Result<Option<PlanInstance>>;

    /// List every active plan instance across all accounts.
    ///
    /// Input for the expiry sweep; the engine filters by `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn active_instances(&self) -> Result<Vec<PlanInstance>>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Persist an updated account and its new ledger entries atomically.
    ///
    /// The account carries the already-mutated balances; `entries` are the
    /// ledger rows recording the change. All rows land in one write batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn apply_ledger(&self, account: &CreditAccount, entries: &[CreditTransaction]) -> Result<()>;

    /// Persist a plan-state change atomically.
    ///
    /// Writes every instance in `instances` (new purchases, expirations,
    /// activations), optionally an updated account (when a credit grant
    /// accompanies the change), and any grant ledger entries, all in one
    /// write batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn apply_plan_change(
        &self,
        instances: &[PlanInstance],
        account: Option<&CreditAccount>,
        entries: &[CreditTransaction],
    ) -> Result<()>;
}
