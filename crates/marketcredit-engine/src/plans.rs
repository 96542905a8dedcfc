//! Plan purchase, status, and expiry.
//!
//! At most one plan instance per account is active at a time. A purchase
//! made while another instance is active queues as a reserved instance; its
//! credit grant is deferred until activation. The expiry sweep is exposed as
//! an idempotent operation for an external scheduler.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use marketcredit_core::{
    AccountId, CreditAccount, PlanCatalog, PlanInstance, PlanStatusView, Result,
};
use marketcredit_store::Store;

use crate::ledger::{grant_plan_credit, Ledger};

/// Plan lifecycle operations over a storage handle.
pub struct PlanService<S: Store> {
    ledger: Arc<Ledger<S>>,
    catalog: PlanCatalog,
}

impl<S: Store> PlanService<S> {
    /// Create a plan service sharing the ledger's store and lock registry.
    #[must_use]
    pub fn new(ledger: Arc<Ledger<S>>, catalog: PlanCatalog) -> Self {
        Self { ledger, catalog }
    }

    /// The plan catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Purchase a plan for an account.
    ///
    /// Without an active unexpired instance the purchase activates
    /// immediately and the plan's credit grant is applied in the same
    /// atomic batch. With one, the purchase is stored reserved and the
    /// grant is deferred until activation.
    ///
    /// # Errors
    ///
    /// - `CreditError::UnknownPlanLevel` if the level is absent or inactive.
    /// - `CreditError::Storage` on persistence failure.
    pub fn purchase(&self, account_id: AccountId, level: u32) -> Result<PlanInstance> {
        let plan = self.catalog.get(level)?;

        self.ledger.with_account_lock(&account_id, || {
            let store = self.ledger.store();
            let now = Utc::now();

            let existing = store.active_instance(&account_id)?;
            if let Some(active) = &existing {
                if !active.is_expired(now) {
                    let instance = PlanInstance::new_reserved(account_id, plan, now);
                    store.apply_plan_change(std::slice::from_ref(&instance), None, &[])?;

                    tracing::info!(
                        account_id = %account_id,
                        level,
                        "plan purchase reserved behind active instance"
                    );
                    return Ok(instance);
                }
            }

            // No usable active instance: retire a stale one if present,
            // activate the purchase, and grant its credit in one batch.
            let mut instances = Vec::with_capacity(2);
            if let Some(mut stale) = existing {
                stale.expire();
                instances.push(stale);
            }

            let instance = PlanInstance::new_active(account_id, plan, now);
            instances.push(instance.clone());

            let mut account = store
                .get_account(&account_id)?
                .unwrap_or_else(|| CreditAccount::new(account_id));
            let entries = grant_plan_credit(&mut account, plan);

            store.apply_plan_change(&instances, Some(&account), &entries)?;

            tracing::info!(
                account_id = %account_id,
                level,
                granted = plan.total_credit,
                "plan purchased and activated"
            );
            Ok(instance)
        })
    }

    /// Snapshot an account's balances and active plan.
    ///
    /// An account that was never created reports zero balances and no plan.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::Storage` on read failure.
    pub fn status(&self, account_id: AccountId) -> Result<PlanStatusView> {
        let store = self.ledger.store();
        let now = Utc::now();

        let (current_credit, bonus_credit) = store
            .get_account(&account_id)?
            .map_or((0, 0), |a| (a.current_credit, a.bonus_credit));

        let active_plan = store
            .active_instance(&account_id)?
            .filter(|instance| !instance.is_expired(now));
        let days_remaining = active_plan
            .as_ref()
            .map_or(0, |instance| instance.days_remaining(now));

        Ok(PlanStatusView {
            current_credit,
            bonus_credit,
            active_plan,
            days_remaining,
        })
    }

    /// Expire every active instance whose window closed at or before `now`.
    ///
    /// When the account holds a reserved instance, it activates with a fresh
    /// validity window and its deferred credit grant is applied, all in the
    /// same batch as the expiration. Safe to call repeatedly for the same
    /// `now`; already-processed instances are skipped.
    ///
    /// Returns the number of instances expired.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::Storage` on persistence failure.
    pub fn expire_due_plans(&self, now: DateTime<Utc>) -> Result<usize> {
        let store = self.ledger.store();
        let due: Vec<PlanInstance> = store
            .active_instances()?
            .into_iter()
            .filter(|instance| instance.expires_at <= now)
            .collect();

        let mut expired = 0;
        for candidate in due {
            self.ledger.with_account_lock(&candidate.account_id, || {
                // Re-read under the lock; a concurrent sweep or purchase may
                // have already retired this instance.
                let Some(mut current) = store.get_plan_instance(&candidate.id)? else {
                    return Ok(());
                };
                if !current.is_active || current.expires_at > now {
                    return Ok(());
                }

                let account_id = current.account_id;
                current.expire();
                let mut instances = vec![current];
                let mut account: Option<CreditAccount> = None;
                let mut entries = Vec::new();

                if let Some(mut reserved) = store.reserved_instance(&account_id)? {
                    if let Some(plan) = self.catalog.get_any(reserved.plan_level) {
                        reserved.activate(now, plan.expiry_days);
                        let mut acct = store
                            .get_account(&account_id)?
                            .unwrap_or_else(|| CreditAccount::new(account_id));
                        entries = grant_plan_credit(&mut acct, plan);
                        account = Some(acct);
                    } else {
                        // Plan retired from the catalog since purchase: the
                        // instance keeps its originally purchased window but
                        // there is no grant to apply.
                        let window_days =
                            (reserved.expires_at - reserved.purchased_at).num_days();
                        reserved.activate(now, window_days);
                        tracing::warn!(
                            account_id = %account_id,
                            level = reserved.plan_level,
                            "reserved plan level missing from catalog; activated without grant"
                        );
                    }

                    tracing::info!(
                        account_id = %account_id,
                        level = reserved.plan_level,
                        "activated reserved plan instance"
                    );
                    instances.push(reserved);
                }

                store.apply_plan_change(&instances, account.as_ref(), &entries)?;
                expired += 1;
                Ok(())
            })?;
        }

        if expired > 0 {
            tracing::info!(expired, "expiry sweep completed");
        }
        Ok(expired)
    }
}
