//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use marketcredit_core::{
    AccountId, CreditAccount, CreditTransaction, PlanInstance, PlanInstanceId, TransactionId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Collect the ULID halves of every composite index key under a prefix,
    /// in key order (oldest first, since ULIDs sort by time).
    fn index_ulids(&self, cf_name: &str, account_id: &AccountId) -> Result<Vec<[u8; 16]>> {
        let cf = self.cf(cf_name)?;
        let prefix = keys::account_prefix(account_id);

        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut ulids = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            ulids.push(keys::extract_ulid_bytes(&key));
        }
        Ok(ulids)
    }

    /// Stage the account row and ledger entry rows into a write batch.
    fn stage_ledger(
        &self,
        batch: &mut WriteBatch,
        account: &CreditAccount,
        entries: &[CreditTransaction],
    ) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_account = self.cf(cf::TRANSACTIONS_BY_ACCOUNT)?;

        let account_key = keys::account_key(&account.account_id);
        let account_value = Self::serialize(account)?;
        batch.put_cf(&cf_accounts, &account_key, &account_value);

        for entry in entries {
            let tx_key = keys::transaction_key(&entry.id);
            let index_key = keys::account_transaction_key(&entry.account_id, &entry.id);
            let tx_value = Self::serialize(entry)?;

            batch.put_cf(&cf_tx, &tx_key, &tx_value);
            batch.put_cf(&cf_tx_by_account, &index_key, []); // Index entry (empty value)
        }
        Ok(())
    }

    /// Commit a write batch.
    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn put_account(&self, account: &CreditAccount) -> Result<()> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(&account.account_id);
        let value = Self::serialize(account)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<CreditAccount>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(account_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Ledger Entry Operations
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        let key = keys::transaction_key(transaction_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        // Oldest first from the index; reverse for newest-first paging.
        let mut ulids = self.index_ulids(cf::TRANSACTIONS_BY_ACCOUNT, account_id)?;
        ulids.reverse();

        let mut transactions = Vec::new();
        for ulid in ulids.into_iter().skip(offset) {
            if transactions.len() >= limit {
                break;
            }
            let tx_id = TransactionId::from_bytes(ulid)
                .map_err(|e| StoreError::Database(e.to_string()))?;
            if let Some(tx) = self.get_transaction(&tx_id)? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    // =========================================================================
    // Plan Instance Operations
    // =========================================================================

    fn get_plan_instance(&self, instance_id: &PlanInstanceId) -> Result<Option<PlanInstance>> {
        let cf = self.cf(cf::PLAN_INSTANCES)?;
        let key = keys::plan_instance_key(instance_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_instances_by_account(&self, account_id: &AccountId) -> Result<Vec<PlanInstance>> {
        let ulids = self.index_ulids(cf::INSTANCES_BY_ACCOUNT, account_id)?;

        let mut instances = Vec::with_capacity(ulids.len());
        for ulid in ulids {
            let instance_id = PlanInstanceId::from_bytes(ulid)
                .map_err(|e| StoreError::Database(e.to_string()))?;
            if let Some(instance) = self.get_plan_instance(&instance_id)? {
                instances.push(instance);
            }
        }

        Ok(instances)
    }

    fn active_instance(&self, account_id: &AccountId) -> Result<Option<PlanInstance>> {
        Ok(self
            .list_instances_by_account(account_id)?
            .into_iter()
            .find(|instance| instance.is_active))
    }

    fn reserved_instance(&self, account_id: &AccountId) -> Result<Option<PlanInstance>> {
        // Oldest first: the earliest reserved purchase activates next.
        Ok(self
            .list_instances_by_account(account_id)?
            .into_iter()
            .find(|instance| instance.is_reserved))
    }

    fn active_instances(&self) -> Result<Vec<PlanInstance>> {
        let cf = self.cf(cf::PLAN_INSTANCES)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);

        let mut instances = Vec::new();
        for item in iter {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let instance: PlanInstance = Self::deserialize(&value)?;
            if instance.is_active {
                instances.push(instance);
            }
        }

        Ok(instances)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn apply_ledger(&self, account: &CreditAccount, entries: &[CreditTransaction]) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_ledger(&mut batch, account, entries)?;
        self.write(batch)?;

        tracing::debug!(
            account_id = %account.account_id,
            entries = entries.len(),
            current = account.current_credit,
            bonus = account.bonus_credit,
            "applied ledger batch"
        );
        Ok(())
    }

    fn apply_plan_change(
        &self,
        instances: &[PlanInstance],
        account: Option<&CreditAccount>,
        entries: &[CreditTransaction],
    ) -> Result<()> {
        let cf_instances = self.cf(cf::PLAN_INSTANCES)?;
        let cf_by_account = self.cf(cf::INSTANCES_BY_ACCOUNT)?;

        let mut batch = WriteBatch::default();

        for instance in instances {
            let instance_key = keys::plan_instance_key(&instance.id);
            let index_key = keys::account_instance_key(&instance.account_id, &instance.id);
            let value = Self::serialize(instance)?;

            batch.put_cf(&cf_instances, &instance_key, &value);
            batch.put_cf(&cf_by_account, &index_key, []);
        }

        if let Some(account) = account {
            self.stage_ledger(&mut batch, account, entries)?;
        }

        self.write(batch)?;

        tracing::debug!(
            instances = instances.len(),
            entries = entries.len(),
            "applied plan change batch"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use marketcredit_core::{CreditType, Plan, PlanStatus};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn test_plan(level: u32) -> Plan {
        Plan {
            level,
            price: 500_000,
            credit_amount: 100_000,
            bonus_credit: 50_000,
            total_credit: 150_000,
            expiry_days: 30,
            status: PlanStatus::Active,
            is_popular: false,
        }
    }

    #[test]
    fn account_roundtrip() {
        let (store, _dir) = create_test_store();
        let account_id = AccountId::generate();
        let mut account = CreditAccount::new(account_id);
        account.current_credit = 5000;
        account.bonus_credit = 1000;

        store.put_account(&account).unwrap();

        let retrieved = store.get_account(&account_id).unwrap().unwrap();
        assert_eq!(retrieved.current_credit, 5000);
        assert_eq!(retrieved.bonus_credit, 1000);

        assert!(store.get_account(&AccountId::generate()).unwrap().is_none());
    }

    #[test]
    fn apply_ledger_writes_account_and_entries() {
        let (store, _dir) = create_test_store();
        let account_id = AccountId::generate();
        let mut account = CreditAccount::new(account_id);
        account.bonus_credit = 4000;

        let entry =
            CreditTransaction::credit(account_id, 4000, CreditType::Bonus, "admin grant", 4000);
        store.apply_ledger(&account, &[entry.clone()]).unwrap();

        let retrieved = store.get_account(&account_id).unwrap().unwrap();
        assert_eq!(retrieved.bonus_credit, 4000);

        let stored = store.get_transaction(&entry.id).unwrap().unwrap();
        assert_eq!(stored.amount, 4000);
        assert_eq!(stored.reason, "admin grant");
    }

    #[test]
    fn transactions_list_newest_first_with_paging() {
        let (store, _dir) = create_test_store();
        let account_id = AccountId::generate();
        let mut account = CreditAccount::new(account_id);

        account.bonus_credit = 100;
        let tx1 = CreditTransaction::credit(account_id, 100, CreditType::Bonus, "first", 100);
        store.apply_ledger(&account, &[tx1]).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(2)); // Ensure different ULIDs

        account.bonus_credit = 300;
        let tx2 = CreditTransaction::credit(account_id, 200, CreditType::Bonus, "second", 300);
        store.apply_ledger(&account, &[tx2]).unwrap();

        let all = store
            .list_transactions_by_account(&account_id, 10, 0)
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].reason, "second"); // Newest first
        assert_eq!(all[1].reason, "first");

        let page1 = store
            .list_transactions_by_account(&account_id, 1, 0)
            .unwrap();
        let page2 = store
            .list_transactions_by_account(&account_id, 1, 1)
            .unwrap();
        assert_eq!(page1[0].reason, "second");
        assert_eq!(page2[0].reason, "first");
    }

    #[test]
    fn plan_instance_indexes() {
        let (store, _dir) = create_test_store();
        let account_id = AccountId::generate();
        let now = Utc::now();

        let active = PlanInstance::new_active(account_id, &test_plan(1), now);
        store
            .apply_plan_change(&[active.clone()], None, &[])
            .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(2));

        let reserved = PlanInstance::new_reserved(account_id, &test_plan(2), now);
        store
            .apply_plan_change(&[reserved.clone()], None, &[])
            .unwrap();

        let found_active = store.active_instance(&account_id).unwrap().unwrap();
        assert_eq!(found_active.id, active.id);

        let found_reserved = store.reserved_instance(&account_id).unwrap().unwrap();
        assert_eq!(found_reserved.id, reserved.id);

        let all = store.list_instances_by_account(&account_id).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, active.id); // Oldest first

        // Unrelated account sees nothing.
        let other = AccountId::generate();
        assert!(store.active_instance(&other).unwrap().is_none());
        assert!(store.list_instances_by_account(&other).unwrap().is_empty());
    }

    #[test]
    fn active_instances_scan() {
        let (store, _dir) = create_test_store();
        let now = Utc::now();

        for _ in 0..3 {
            let instance = PlanInstance::new_active(AccountId::generate(), &test_plan(1), now);
            store.apply_plan_change(&[instance], None, &[]).unwrap();
        }
        let reserved = PlanInstance::new_reserved(AccountId::generate(), &test_plan(1), now);
        store.apply_plan_change(&[reserved], None, &[]).unwrap();

        let active = store.active_instances().unwrap();
        assert_eq!(active.len(), 3);
        assert!(active.iter().all(|i| i.is_active));
    }

    #[test]
    fn plan_change_with_grant_is_atomic_unit() {
        let (store, _dir) = create_test_store();
        let account_id = AccountId::generate();
        let now = Utc::now();
        let plan = test_plan(1);

        let instance = PlanInstance::new_active(account_id, &plan, now);
        let mut account = CreditAccount::new(account_id);
        account.current_credit = plan.credit_amount;
        account.bonus_credit = plan.bonus_credit;
        let entries = vec![
            CreditTransaction::credit(
                account_id,
                plan.credit_amount,
                CreditType::Current,
                "plan level 1",
                plan.credit_amount,
            ),
            CreditTransaction::credit(
                account_id,
                plan.bonus_credit,
                CreditType::Bonus,
                "plan level 1",
                plan.bonus_credit,
            ),
        ];

        store
            .apply_plan_change(&[instance.clone()], Some(&account), &entries)
            .unwrap();

        let stored_account = store.get_account(&account_id).unwrap().unwrap();
        assert_eq!(stored_account.total_credit(), plan.total_credit);

        let stored_instance = store.get_plan_instance(&instance.id).unwrap().unwrap();
        assert!(stored_instance.is_active);

        let txs = store
            .list_transactions_by_account(&account_id, 10, 0)
            .unwrap();
        assert_eq!(txs.len(), 2);
    }
}
