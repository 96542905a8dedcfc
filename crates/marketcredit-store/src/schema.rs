//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Ledger entries, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: ledger entries by account, keyed by `account_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_ACCOUNT: &str = "transactions_by_account";

    /// Plan instances, keyed by `instance_id` (ULID).
    pub const PLAN_INSTANCES: &str = "plan_instances";

    /// Index: plan instances by account, keyed by `account_id || instance_id`.
    /// Value is empty (index only).
    pub const INSTANCES_BY_ACCOUNT: &str = "instances_by_account";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_ACCOUNT,
        cf::PLAN_INSTANCES,
        cf::INSTANCES_BY_ACCOUNT,
    ]
}
