//! Core types for the marketcredit ledger.
//!
//! This crate provides the foundational types used throughout the
//! marketcredit platform:
//!
//! - **Identifiers**: `AccountId`, `TransactionId`, `PlanInstanceId`
//! - **Accounts**: `CreditAccount` with its paired current/bonus balances
//! - **Ledger entries**: `CreditTransaction`, `CreditType`, `DebitPreference`
//! - **Activity pricing**: `ActivityCatalog`, `ActivityPriceRule`, `PriceQuote`
//! - **Plans**: `PlanCatalog`, `Plan`, `PlanInstance`, `PlanStatusView`
//!
//! # Credit unit
//!
//! All prices and balances are integer amounts in the currency minor unit.
//! Balances are stored as `i64` to avoid floating point precision issues;
//! negative balances are forbidden by the ledger invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod catalog;
pub mod credits;
pub mod error;
pub mod ids;
pub mod plan;

pub use account::CreditAccount;
pub use catalog::{ActivityCatalog, ActivityPriceRule, PriceQuote, PriceType};
pub use credits::{
    validate_amount, ConsumptionReceipt, CreditTransaction, CreditType, DebitPreference,
};
pub use error::{CreditError, Result};
pub use ids::{AccountId, IdError, PlanInstanceId, TransactionId};
pub use plan::{Plan, PlanCatalog, PlanInstance, PlanStatus, PlanStatusView};
