//! Credit ledger and activity-pricing engine.
//!
//! This crate wires the core domain types to a storage handle and exposes
//! the caller-facing operation surface:
//!
//! - [`Ledger`] — atomic per-account debits and credits with an append-only
//!   entry log (`debit`, `credit`, `balances`, `transactions`)
//! - [`PlanService`] — plan purchase, status, and expiry sweep
//!   (`purchase`, `status`, `expire_due_plans`)
//! - [`Orchestrator`] — activity consumption and admin credit operations
//!   (`consume`, `admin_add_credit`, `admin_deduct_credit`)
//!
//! The engine owns no background threads: the expiry sweep is exposed as an
//! idempotent operation for an external scheduler to invoke. All persistence
//! goes through an explicitly injected [`Store`](marketcredit_store::Store)
//! handle; the balance pair of a `CreditAccount` is mutated only by the
//! ledger, under a per-account serialization boundary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod consume;
pub mod ledger;
pub mod plans;

pub use consume::{EngineConfig, Orchestrator};
pub use ledger::Ledger;
pub use plans::PlanService;
