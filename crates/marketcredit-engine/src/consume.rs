//! Activity consumption orchestration.
//!
//! Resolves an activity's price from the catalog, enforces the plan gate
//! where the rule requires one, and delegates the debit to the ledger.

use std::sync::Arc;
use std::time::Duration;

use marketcredit_core::{
    AccountId, ActivityCatalog, ConsumptionReceipt, CreditError, CreditTransaction, CreditType,
    DebitPreference, PriceQuote, Result,
};
use marketcredit_store::Store;

use crate::ledger::Ledger;
use crate::plans::PlanService;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retry attempts for transient read failures.
const READ_MAX_RETRIES: u32 = 3;

/// Initial backoff duration for read retries (doubles with each attempt).
const READ_INITIAL_BACKOFF_MS: u64 = 50;

/// Maximum backoff duration for read retries.
const READ_MAX_BACKOFF_MS: u64 = 1000;

/// Engine-wide policy knobs.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Order in which debits consume the two balances.
    pub debit_preference: DebitPreference,
}

/// The activity consumption orchestrator.
///
/// Also carries the admin credit operations, which are thin ledger wrappers
/// sharing the same operation surface.
pub struct Orchestrator<S: Store> {
    ledger: Arc<Ledger<S>>,
    plans: Arc<PlanService<S>>,
    catalog: ActivityCatalog,
    config: EngineConfig,
}

impl<S: Store> Orchestrator<S> {
    /// Create an orchestrator over existing components.
    #[must_use]
    pub fn new(
        ledger: Arc<Ledger<S>>,
        plans: Arc<PlanService<S>>,
        catalog: ActivityCatalog,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger,
            plans,
            catalog,
            config,
        }
    }

    /// The activity price catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &ActivityCatalog {
        &self.catalog
    }

    /// Resolve the price of an activity without consuming it.
    ///
    /// # Errors
    ///
    /// Propagates `CreditError::UnknownActivity` and
    /// `CreditError::InvalidQuantity` from the catalog.
    pub fn resolve_price(&self, activity_key: &str, quantity: u32) -> Result<PriceQuote> {
        self.catalog.resolve_price(activity_key, quantity)
    }

    /// Consume an activity, debiting its price from the account.
    ///
    /// Resolves the price, verifies the plan gate for rules that require an
    /// active plan, then debits with the configured preference. Any failure
    /// leaves balances and the entry log untouched.
    ///
    /// # Errors
    ///
    /// - `CreditError::UnknownActivity` / `CreditError::InvalidQuantity`
    ///   from price resolution.
    /// - `CreditError::NoActivePlan` if the rule is plan-gated and the
    ///   account has no active, unexpired instance.
    /// - `CreditError::AccountNotFound` / `CreditError::InsufficientCredit`
    ///   from the ledger.
    /// - `CreditError::Storage` on persistence failure.
    pub fn consume(
        &self,
        account_id: AccountId,
        activity_key: &str,
        quantity: Option<u32>,
        description: Option<&str>,
    ) -> Result<ConsumptionReceipt> {
        let quantity = quantity.unwrap_or(1);
        let rule = self.catalog.get(activity_key)?;
        let quote = self.catalog.resolve_price(activity_key, quantity)?;

        if rule.requires_plan {
            let status = with_read_retries(|| self.plans.status(account_id))?;
            if status.active_plan.is_none() {
                return Err(CreditError::NoActivePlan {
                    account_id: account_id.to_string(),
                });
            }
        }

        let reason = match description {
            Some(text) => format!("{activity_key}: {text}"),
            None => activity_key.to_string(),
        };
        let transactions = self.ledger.debit(
            account_id,
            quote.total_price,
            self.config.debit_preference,
            &reason,
        )?;

        let account = with_read_retries(|| self.ledger.balances(account_id))?;

        tracing::info!(
            account_id = %account_id,
            activity = activity_key,
            quantity,
            total_price = quote.total_price,
            "activity consumed"
        );

        Ok(ConsumptionReceipt {
            activity_key: activity_key.to_string(),
            quantity,
            total_price: quote.total_price,
            transactions,
            remaining_current: account.current_credit,
            remaining_bonus: account.bonus_credit,
        })
    }

    /// Grant credit to an account on behalf of an operator.
    ///
    /// Creates the account record if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - `CreditError::InvalidAmount` if `amount <= 0`.
    /// - `CreditError::Storage` on persistence failure.
    pub fn admin_add_credit(
        &self,
        account_id: AccountId,
        amount: i64,
        credit_type: CreditType,
        note: &str,
    ) -> Result<CreditTransaction> {
        self.ledger
            .credit(account_id, amount, credit_type, &format!("admin: {note}"))
    }

    /// Deduct credit from one named balance on behalf of an operator.
    ///
    /// The named balance alone must cover the amount; the other balance is
    /// not consulted.
    ///
    /// # Errors
    ///
    /// - `CreditError::InvalidAmount` if `amount <= 0`.
    /// - `CreditError::AccountNotFound` if the account was never created.
    /// - `CreditError::InsufficientCredit` if the named balance is short.
    /// - `CreditError::Storage` on persistence failure.
    pub fn admin_deduct_credit(
        &self,
        account_id: AccountId,
        amount: i64,
        credit_type: CreditType,
        note: &str,
    ) -> Result<CreditTransaction> {
        self.ledger
            .debit_single(account_id, amount, credit_type, &format!("admin: {note}"))
    }
}

/// Retry a read-only operation through transient storage failures.
///
/// Mutations are never routed through this helper: a timed-out write has an
/// unknown outcome and the caller must re-query state before retrying.
fn with_read_retries<T>(mut f: impl FnMut() -> Result<T>) -> Result<T> {
    let mut backoff = READ_INITIAL_BACKOFF_MS;
    let mut attempt = 0;
    loop {
        match f() {
            Err(err) if err.is_transient() && attempt < READ_MAX_RETRIES => {
                attempt += 1;
                tracing::warn!(attempt, error = %err, "transient storage error on read, retrying");
                std::thread::sleep(Duration::from_millis(backoff));
                backoff = (backoff * 2).min(READ_MAX_BACKOFF_MS);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn read_retries_recover_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_read_retries(|| {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CreditError::Storage("flaky".into()))
            } else {
                Ok(42)
            }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn read_retries_do_not_mask_business_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_read_retries(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CreditError::InvalidAmount { amount: -1 })
        });

        assert!(matches!(result, Err(CreditError::InvalidAmount { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1); // No retry on client errors
    }

    #[test]
    fn read_retries_give_up_after_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_read_retries(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CreditError::Storage("down".into()))
        });

        assert!(matches!(result, Err(CreditError::Storage(_))));
        assert_eq!(calls.load(Ordering::SeqCst), READ_MAX_RETRIES + 1);
    }
}
