//! Ledger entry types.
//!
//! Every balance change appends exactly one `CreditTransaction` per affected
//! balance. Entries are append-only: never mutated, never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CreditError, Result};
use crate::{AccountId, TransactionId};

/// Which of the two account balances an entry touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditType {
    /// Paid, cash-equivalent credit.
    Current,
    /// Promotional credit granted on top of purchases.
    Bonus,
}

impl CreditType {
    /// Get the credit type name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Bonus => "bonus",
        }
    }
}

/// Order in which a debit consumes the two balances.
///
/// The platform default is `BonusFirst`: promotional credit exists to be
/// spent before cash-equivalent credit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebitPreference {
    /// Consume bonus credit first, then current credit.
    #[default]
    BonusFirst,
    /// Consume current credit first, then bonus credit.
    CurrentFirst,
}

impl DebitPreference {
    /// The balances in consumption order.
    #[must_use]
    pub const fn order(&self) -> [CreditType; 2] {
        match self {
            Self::BonusFirst => [CreditType::Bonus, CreditType::Current],
            Self::CurrentFirst => [CreditType::Current, CreditType::Bonus],
        }
    }
}

/// An append-only ledger entry recording one balance change.
///
/// `amount` is signed: positive for credits, negative for debits.
/// `balance_after` snapshots the affected balance immediately after the
/// change, so the latest entry per credit type always matches the cached
/// account balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique entry id (ULID for time-ordering).
    pub id: TransactionId,

    /// The account whose balance was affected.
    pub account_id: AccountId,

    /// Amount in minor units. Positive = credit, negative = debit.
    pub amount: i64,

    /// Which balance was affected.
    pub credit_type: CreditType,

    /// Activity key or admin note explaining the change.
    pub reason: String,

    /// The affected balance immediately after this entry.
    pub balance_after: i64,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Create a debit entry. The stored amount is always negative.
    #[must_use]
    pub fn debit(
        account_id: AccountId,
        amount: i64,
        credit_type: CreditType,
        reason: impl Into<String>,
        balance_after: i64,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            amount: -amount.abs(),
            credit_type,
            reason: reason.into(),
            balance_after,
            created_at: Utc::now(),
        }
    }

    /// Create a credit entry. The stored amount is always positive.
    #[must_use]
    pub fn credit(
        account_id: AccountId,
        amount: i64,
        credit_type: CreditType,
        reason: impl Into<String>,
        balance_after: i64,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            amount: amount.abs(),
            credit_type,
            reason: reason.into(),
            balance_after,
            created_at: Utc::now(),
        }
    }
}

/// Receipt returned to the caller after a successful activity consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionReceipt {
    /// The activity that was billed.
    pub activity_key: String,

    /// Quantity that was billed (1 for fixed-price activities).
    pub quantity: u32,

    /// Total price debited in minor units.
    pub total_price: i64,

    /// The ledger entries the debit produced (one per touched balance).
    pub transactions: Vec<CreditTransaction>,

    /// Current credit remaining after the debit.
    pub remaining_current: i64,

    /// Bonus credit remaining after the debit.
    pub remaining_bonus: i64,
}

/// Validate that an amount is a positive integer.
///
/// Pure validation, composed ahead of ledger operations so transport layers
/// never reach the domain with malformed numbers.
///
/// # Errors
///
/// Returns `CreditError::InvalidAmount` for zero or negative amounts.
pub fn validate_amount(amount: i64) -> Result<i64> {
    if amount <= 0 {
        return Err(CreditError::InvalidAmount { amount });
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_entries_are_negative() {
        let account_id = AccountId::generate();
        let tx = CreditTransaction::debit(account_id, 500, CreditType::Bonus, "PRODUCT_BOOST", 100);

        assert_eq!(tx.amount, -500);
        assert_eq!(tx.credit_type, CreditType::Bonus);
        assert_eq!(tx.balance_after, 100);
    }

    #[test]
    fn credit_entries_are_positive() {
        let account_id = AccountId::generate();
        let tx =
            CreditTransaction::credit(account_id, 2000, CreditType::Current, "plan level 2", 2000);

        assert_eq!(tx.amount, 2000);
        assert_eq!(tx.reason, "plan level 2");
    }

    #[test]
    fn preference_order() {
        assert_eq!(
            DebitPreference::BonusFirst.order(),
            [CreditType::Bonus, CreditType::Current]
        );
        assert_eq!(
            DebitPreference::CurrentFirst.order(),
            [CreditType::Current, CreditType::Bonus]
        );
        assert_eq!(DebitPreference::default(), DebitPreference::BonusFirst);
    }

    #[test]
    fn amount_validation() {
        assert!(validate_amount(1).is_ok());
        assert!(matches!(
            validate_amount(0),
            Err(CreditError::InvalidAmount { amount: 0 })
        ));
        assert!(matches!(
            validate_amount(-5),
            Err(CreditError::InvalidAmount { amount: -5 })
        ));
    }
}
