//! Credit account types.
//!
//! A `CreditAccount` holds the paired balances for one business account. The
//! balances are a derived cache: the append-only transaction log is the
//! source of truth, and the sum of signed entry amounts per credit type must
//! reconstruct the cached balance exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credits::CreditType;
use crate::AccountId;

/// A credit account for a business account.
///
/// Tracks the current (paid, cash-equivalent) and bonus (promotional)
/// balances. Both balances are non-negative at all times; only the ledger
/// mutates them. Accounts are created lazily on the first plan purchase or
/// admin credit grant and are never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAccount {
    /// The owning account id.
    pub account_id: AccountId,

    /// Paid, cash-equivalent balance in minor units.
    pub current_credit: i64,

    /// Promotional balance in minor units, granted on top of purchases.
    pub bonus_credit: i64,

    /// When the account record was created.
    pub created_at: DateTime<Utc>,

    /// When the account record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    /// Create a new account with zero balances.
    #[must_use]
    pub fn new(account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            current_credit: 0,
            bonus_credit: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total credit available across both balances.
    #[must_use]
    pub const fn total_credit(&self) -> i64 {
        self.current_credit + self.bonus_credit
    }

    /// Check whether the combined balances can cover a debit.
    #[must_use]
    pub const fn has_sufficient(&self, amount: i64) -> bool {
        self.total_credit() >= amount
    }

    /// Read the balance of one credit type.
    #[must_use]
    pub const fn balance(&self, credit_type: CreditType) -> i64 {
        match credit_type {
            CreditType::Current => self.current_credit,
            CreditType::Bonus => self.bonus_credit,
        }
    }

    /// Overwrite the balance of one credit type.
    ///
    /// Callers (the ledger) are responsible for never setting a negative
    /// balance; this is a plain field write.
    pub fn set_balance(&mut self, credit_type: CreditType, balance: i64) {
        match credit_type {
            CreditType::Current => self.current_credit = balance,
            CreditType::Bonus => self.bonus_credit = balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_has_zero_balances() {
        let account = CreditAccount::new(AccountId::generate());
        assert_eq!(account.current_credit, 0);
        assert_eq!(account.bonus_credit, 0);
        assert_eq!(account.total_credit(), 0);
    }

    #[test]
    fn sufficiency_spans_both_balances() {
        let mut account = CreditAccount::new(AccountId::generate());
        account.current_credit = 300;
        account.bonus_credit = 700;

        assert!(account.has_sufficient(1000));
        assert!(!account.has_sufficient(1001));
    }

    #[test]
    fn balance_accessors_by_type() {
        let mut account = CreditAccount::new(AccountId::generate());
        account.set_balance(CreditType::Current, 42);
        account.set_balance(CreditType::Bonus, 7);

        assert_eq!(account.balance(CreditType::Current), 42);
        assert_eq!(account.balance(CreditType::Bonus), 7);
    }
}
