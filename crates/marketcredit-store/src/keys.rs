//! Key encoding utilities for `RocksDB`.
//!
//! Keys are raw identifier bytes. Index keys concatenate the 16-byte account
//! UUID with a 16-byte ULID; since ULIDs are time-ordered, an account's
//! entries and instances come back sorted by creation time.

use marketcredit_core::{AccountId, PlanInstanceId, TransactionId};

/// Create an account key from an account id.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create a ledger entry key from a transaction id.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create an account-transaction index key.
///
/// Format: `account_id (16 bytes) || transaction_id (16 bytes)`
#[must_use]
pub fn account_transaction_key(account_id: &AccountId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a plan instance key from an instance id.
#[must_use]
pub fn plan_instance_key(instance_id: &PlanInstanceId) -> Vec<u8> {
    instance_id.to_bytes().to_vec()
}

/// Create an account-instance index key.
///
/// Format: `account_id (16 bytes) || instance_id (16 bytes)`
#[must_use]
pub fn account_instance_key(account_id: &AccountId, instance_id: &PlanInstanceId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&instance_id.to_bytes());
    key
}

/// Create a prefix for iterating all index rows for an account.
#[must_use]
pub fn account_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Extract the trailing 16-byte ULID from a composite index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_ulid_bytes(key: &[u8]) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_key_length() {
        let account_id = AccountId::generate();
        assert_eq!(account_key(&account_id).len(), 16);
    }

    #[test]
    fn composite_index_key_format() {
        let account_id = AccountId::generate();
        let tx_id = TransactionId::generate();
        let key = account_transaction_key(&account_id, &tx_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], account_id.as_bytes());
        assert_eq!(&key[16..], tx_id.to_bytes());
    }

    #[test]
    fn extract_ulid_roundtrip() {
        let account_id = AccountId::generate();
        let instance_id = PlanInstanceId::generate();
        let key = account_instance_key(&account_id, &instance_id);

        let extracted = PlanInstanceId::from_bytes(extract_ulid_bytes(&key)).unwrap();
        assert_eq!(extracted, instance_id);
    }
}
