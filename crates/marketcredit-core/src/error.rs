//! Error types for marketcredit.

use crate::ids::IdError;

/// Result type for marketcredit operations.
pub type Result<T> = std::result::Result<T, CreditError>;

/// Errors that can occur in marketcredit operations.
///
/// Catalog and validation variants are client errors and non-retryable.
/// `InsufficientCredit` and `NoActivePlan` are business-rule failures, not
/// system faults. `Storage` and `Serialization` propagate infrastructure
/// failures; callers must re-query state before retrying a mutation whose
/// outcome is unknown.
#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    /// No pricing rule exists for the requested activity.
    #[error("unknown activity: {activity_key}")]
    UnknownActivity {
        /// The activity key with no catalog entry.
        activity_key: String,
    },

    /// No purchasable plan exists at the requested level.
    #[error("unknown or inactive plan level: {level}")]
    UnknownPlanLevel {
        /// The plan level with no active catalog entry.
        level: u32,
    },

    /// The supplied quantity is invalid for the pricing rule.
    #[error("invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity.
        quantity: u32,
    },

    /// The supplied amount is not a positive integer.
    #[error("invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount.
        amount: i64,
    },

    /// The account cannot cover the requested debit.
    #[error("insufficient credit: account={account_id}, available={available}, required={required}")]
    InsufficientCredit {
        /// The account that was debited.
        account_id: String,
        /// Total credit available (current + bonus).
        available: i64,
        /// Amount the debit required.
        required: i64,
    },

    /// The account has no active, unexpired plan instance.
    #[error("no active plan for account: {account_id}")]
    NoActivePlan {
        /// The account missing a plan.
        account_id: String,
    },

    /// Account not found.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The account id that was not found.
        account_id: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Configuration error (catalog load failure).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CreditError {
    /// Whether the error is a transient infrastructure failure that a
    /// read-only operation may retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
