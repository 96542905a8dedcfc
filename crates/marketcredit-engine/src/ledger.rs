//! The credit ledger.
//!
//! Owns all balance mutations. Every debit or credit runs under the
//! account's serialization lock as one unit: read balances, check
//! sufficiency, write balances, append entries. Two concurrent debits
//! against the same account can therefore never both pass the sufficiency
//! check against a stale read.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use dashmap::DashMap;

use marketcredit_core::{
    validate_amount, AccountId, CreditAccount, CreditError, CreditTransaction, CreditType,
    DebitPreference, Plan, Result,
};
use marketcredit_store::Store;

/// The credit ledger for all accounts.
///
/// Holds the storage handle and a per-account lock registry. Cross-account
/// operations proceed fully in parallel; operations on one account are
/// serialized.
pub struct Ledger<S: Store> {
    store: Arc<S>,
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl<S: Store> Ledger<S> {
    /// Create a ledger over a storage handle.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// The underlying storage handle.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run `f` while holding the account's serialization lock.
    ///
    /// The plan lifecycle reuses this boundary for purchase and activation
    /// so that plan grants and debits on the same account never interleave.
    pub(crate) fn with_account_lock<R>(
        &self,
        account_id: &AccountId,
        f: impl FnOnce() -> Result<R>,
    ) -> Result<R> {
        let lock = self
            .locks
            .entry(*account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Debit an account across both balances in preference order.
    ///
    /// All-or-nothing: if the combined balances cannot cover `amount`, no
    /// state changes. A successful debit produces one entry per touched
    /// balance (at most two), persisted atomically with the updated account.
    ///
    /// # Errors
    ///
    /// - `CreditError::InvalidAmount` if `amount <= 0`.
    /// - `CreditError::AccountNotFound` if the account was never created.
    /// - `CreditError::InsufficientCredit` if `current + bonus < amount`.
    /// - `CreditError::Storage` on persistence failure.
    pub fn debit(
        &self,
        account_id: AccountId,
        amount: i64,
        preference: DebitPreference,
        reason: &str,
    ) -> Result<Vec<CreditTransaction>> {
        validate_amount(amount)?;

        self.with_account_lock(&account_id, || {
            let mut account =
                self.store
                    .get_account(&account_id)?
                    .ok_or_else(|| CreditError::AccountNotFound {
                        account_id: account_id.to_string(),
                    })?;

            if !account.has_sufficient(amount) {
                return Err(CreditError::InsufficientCredit {
                    account_id: account_id.to_string(),
                    available: account.total_credit(),
                    required: amount,
                });
            }

            let mut remaining = amount;
            let mut entries = Vec::with_capacity(2);
            for credit_type in preference.order() {
                if remaining == 0 {
                    break;
                }
                let balance = account.balance(credit_type);
                let take = remaining.min(balance);
                if take == 0 {
                    continue;
                }
                let new_balance = balance - take;
                account.set_balance(credit_type, new_balance);
                entries.push(CreditTransaction::debit(
                    account_id,
                    take,
                    credit_type,
                    reason,
                    new_balance,
                ));
                remaining -= take;
            }
            account.updated_at = Utc::now();

            self.store.apply_ledger(&account, &entries)?;

            tracing::info!(
                account_id = %account_id,
                amount,
                reason,
                remaining_current = account.current_credit,
                remaining_bonus = account.bonus_credit,
                "debited account"
            );
            Ok(entries)
        })
    }

    /// Debit a single named balance.
    ///
    /// Unlike [`debit`](Self::debit), the other balance is not consulted:
    /// the named balance alone must cover the amount. Used by admin
    /// deductions that target a specific credit type.
    ///
    /// # Errors
    ///
    /// Same as [`debit`](Self::debit), with sufficiency judged against the
    /// named balance only.
    pub fn debit_single(
        &self,
        account_id: AccountId,
        amount: i64,
        credit_type: CreditType,
        reason: &str,
    ) -> Result<CreditTransaction> {
        validate_amount(amount)?;

        self.with_account_lock(&account_id, || {
            let mut account =
                self.store
                    .get_account(&account_id)?
                    .ok_or_else(|| CreditError::AccountNotFound {
                        account_id: account_id.to_string(),
                    })?;

            let balance = account.balance(credit_type);
            if balance < amount {
                return Err(CreditError::InsufficientCredit {
                    account_id: account_id.to_string(),
                    available: balance,
                    required: amount,
                });
            }

            let new_balance = balance - amount;
            account.set_balance(credit_type, new_balance);
            account.updated_at = Utc::now();

            let entry =
                CreditTransaction::debit(account_id, amount, credit_type, reason, new_balance);
            self.store.apply_ledger(&account, std::slice::from_ref(&entry))?;

            tracing::info!(
                account_id = %account_id,
                amount,
                credit_type = credit_type.as_str(),
                reason,
                "debited single balance"
            );
            Ok(entry)
        })
    }

    /// Credit one balance of an account.
    ///
    /// Creates the account record on the first grant.
    ///
    /// # Errors
    ///
    /// - `CreditError::InvalidAmount` if `amount <= 0`.
    /// - `CreditError::Storage` on persistence failure.
    pub fn credit(
        &self,
        account_id: AccountId,
        amount: i64,
        credit_type: CreditType,
        reason: &str,
    ) -> Result<CreditTransaction> {
        validate_amount(amount)?;

        self.with_account_lock(&account_id, || {
            let mut account = self
                .store
                .get_account(&account_id)?
                .unwrap_or_else(|| CreditAccount::new(account_id));

            let new_balance = account.balance(credit_type) + amount;
            account.set_balance(credit_type, new_balance);
            account.updated_at = Utc::now();

            let entry =
                CreditTransaction::credit(account_id, amount, credit_type, reason, new_balance);
            self.store.apply_ledger(&account, std::slice::from_ref(&entry))?;

            tracing::info!(
                account_id = %account_id,
                amount,
                credit_type = credit_type.as_str(),
                reason,
                "credited account"
            );
            Ok(entry)
        })
    }

    /// Read an account's balances.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::AccountNotFound` if the account was never
    /// created, or `CreditError::Storage` on read failure.
    pub fn balances(&self, account_id: AccountId) -> Result<CreditAccount> {
        self.store
            .get_account(&account_id)?
            .ok_or_else(|| CreditError::AccountNotFound {
                account_id: account_id.to_string(),
            })
    }

    /// List an account's ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::Storage` on read failure.
    pub fn transactions(
        &self,
        account_id: AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        Ok(self
            .store
            .list_transactions_by_account(&account_id, limit, offset)?)
    }
}

/// Apply a plan's credit grant to an account and build the grant entries.
///
/// Mutates the balances in place; the caller persists the account and the
/// entries in the same batch as the plan-state change. Zero components
/// produce no entry.
pub(crate) fn grant_plan_credit(
    account: &mut CreditAccount,
    plan: &Plan,
) -> Vec<CreditTransaction> {
    let reason = format!("plan level {} grant", plan.level);
    let mut entries = Vec::with_capacity(2);

    for (credit_type, amount) in [
        (CreditType::Current, plan.credit_amount),
        (CreditType::Bonus, plan.bonus_credit),
    ] {
        if amount == 0 {
            continue;
        }
        let new_balance = account.balance(credit_type) + amount;
        account.set_balance(credit_type, new_balance);
        entries.push(CreditTransaction::credit(
            account.account_id,
            amount,
            credit_type,
            reason.clone(),
            new_balance,
        ));
    }
    account.updated_at = Utc::now();
    entries
}
