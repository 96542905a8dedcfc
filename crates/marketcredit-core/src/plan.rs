//! Plan catalog and plan instances.
//!
//! Plans are static reference data describing the purchasable tiers; a
//! `PlanInstance` records one purchase of a plan by an account. At most one
//! instance per account is active at a time; later purchases queue as
//! reserved instances that activate when the current one expires.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CreditError, Result};
use crate::{AccountId, PlanInstanceId};

/// Number of seconds in one day, used for remaining-validity arithmetic.
const SECONDS_PER_DAY: i64 = 86_400;

/// Whether a plan can currently be purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Purchasable.
    Active,
    /// Retired; existing instances keep running but no new purchases.
    Inactive,
}

/// A purchasable plan tier (static reference data).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique tier level.
    pub level: u32,

    /// Purchase price in minor units.
    pub price: i64,

    /// Current credit granted on activation.
    pub credit_amount: i64,

    /// Bonus credit granted on activation.
    pub bonus_credit: i64,

    /// Total grant; must equal `credit_amount + bonus_credit`.
    pub total_credit: i64,

    /// Validity window in days from activation.
    pub expiry_days: i64,

    /// Whether the plan is purchasable.
    pub status: PlanStatus,

    /// Marketing flag for the storefront.
    pub is_popular: bool,
}

/// Immutable catalog of purchasable plans, keyed by level.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: HashMap<u32, Plan>,
}

impl PlanCatalog {
    /// Build a catalog from a list of plans.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::Configuration` if two plans share a level, a
    /// grant component is negative, or `total_credit` does not equal
    /// `credit_amount + bonus_credit`.
    pub fn new(plans: Vec<Plan>) -> Result<Self> {
        let mut map = HashMap::with_capacity(plans.len());
        for plan in plans {
            if plan.credit_amount < 0 || plan.bonus_credit < 0 || plan.price < 0 {
                return Err(CreditError::Configuration(format!(
                    "negative amount in plan level {}",
                    plan.level
                )));
            }
            if plan.total_credit != plan.credit_amount + plan.bonus_credit {
                return Err(CreditError::Configuration(format!(
                    "plan level {}: total_credit {} != credit_amount {} + bonus_credit {}",
                    plan.level, plan.total_credit, plan.credit_amount, plan.bonus_credit
                )));
            }
            if map.contains_key(&plan.level) {
                return Err(CreditError::Configuration(format!(
                    "duplicate plan level in catalog: {}",
                    plan.level
                )));
            }
            map.insert(plan.level, plan);
        }
        Ok(Self { plans: map })
    }

    /// Look up a purchasable plan by level.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::UnknownPlanLevel` if the level is absent or the
    /// plan is inactive.
    pub fn get(&self, level: u32) -> Result<&Plan> {
        self.plans
            .get(&level)
            .filter(|plan| plan.status == PlanStatus::Active)
            .ok_or(CreditError::UnknownPlanLevel { level })
    }

    /// Look up a plan by level regardless of status.
    ///
    /// Used when activating a reserved instance whose plan may have been
    /// retired since purchase; the purchase already happened, so the grant
    /// still applies.
    #[must_use]
    pub fn get_any(&self, level: u32) -> Option<&Plan> {
        self.plans.get(&level)
    }

    /// All plans in the catalog, in arbitrary order.
    pub fn plans(&self) -> impl Iterator<Item = &Plan> {
        self.plans.values()
    }
}

impl Default for PlanCatalog {
    /// The production plan table.
    fn default() -> Self {
        Self::new(vec![
            Plan {
                level: 1,
                price: 500_000,
                credit_amount: 0,
                bonus_credit: 200_000,
                total_credit: 200_000,
                expiry_days: 30,
                status: PlanStatus::Active,
                is_popular: true,
            },
            Plan {
                level: 2,
                price: 1_200_000,
                credit_amount: 300_000,
                bonus_credit: 150_000,
                total_credit: 450_000,
                expiry_days: 60,
                status: PlanStatus::Active,
                is_popular: false,
            },
            Plan {
                level: 3,
                price: 2_500_000,
                credit_amount: 800_000,
                bonus_credit: 400_000,
                total_credit: 1_200_000,
                expiry_days: 90,
                status: PlanStatus::Active,
                is_popular: false,
            },
        ])
        .expect("static plan catalog is valid")
    }
}

/// One purchase of a plan by an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInstance {
    /// Unique instance id (ULID for time-ordering).
    pub id: PlanInstanceId,

    /// The purchasing account.
    pub account_id: AccountId,

    /// Level of the purchased plan.
    pub plan_level: u32,

    /// When the purchase was made.
    pub purchased_at: DateTime<Utc>,

    /// When the validity window closes. Provisional for reserved instances;
    /// recomputed when they activate.
    pub expires_at: DateTime<Utc>,

    /// Whether this is the account's active instance.
    pub is_active: bool,

    /// Whether this instance is queued behind an active one.
    pub is_reserved: bool,
}

impl PlanInstance {
    /// Create an immediately-active instance.
    #[must_use]
    pub fn new_active(account_id: AccountId, plan: &Plan, now: DateTime<Utc>) -> Self {
        Self {
            id: PlanInstanceId::generate(),
            account_id,
            plan_level: plan.level,
            purchased_at: now,
            expires_at: now + Duration::days(plan.expiry_days),
            is_active: true,
            is_reserved: false,
        }
    }

    /// Create a reserved instance queued behind the account's active one.
    #[must_use]
    pub fn new_reserved(account_id: AccountId, plan: &Plan, now: DateTime<Utc>) -> Self {
        Self {
            id: PlanInstanceId::generate(),
            account_id,
            plan_level: plan.level,
            purchased_at: now,
            expires_at: now + Duration::days(plan.expiry_days),
            is_active: false,
            is_reserved: true,
        }
    }

    /// Whether the validity window has closed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whole days of validity remaining, rounded up and clamped to zero.
    #[must_use]
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        let seconds = (self.expires_at - now).num_seconds();
        if seconds <= 0 {
            0
        } else {
            // `i64::div_ceil` is unstable; `seconds` is positive here, so the
            // unsigned computation is identical.
            (seconds as u64).div_ceil(SECONDS_PER_DAY as u64) as i64
        }
    }

    /// Mark the instance expired.
    pub fn expire(&mut self) {
        self.is_active = false;
        self.is_reserved = false;
    }

    /// Activate a reserved instance. The validity window restarts at `now`.
    pub fn activate(&mut self, now: DateTime<Utc>, expiry_days: i64) {
        self.is_active = true;
        self.is_reserved = false;
        self.expires_at = now + Duration::days(expiry_days);
    }
}

/// Snapshot of an account's plan and balances returned by the status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStatusView {
    /// Current credit balance.
    pub current_credit: i64,

    /// Bonus credit balance.
    pub bonus_credit: i64,

    /// The active, unexpired instance, if any.
    pub active_plan: Option<PlanInstance>,

    /// Days of validity remaining on the active instance (0 without one).
    pub days_remaining: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(level: u32, credit: i64, bonus: i64, days: i64) -> Plan {
        Plan {
            level,
            price: 100_000,
            credit_amount: credit,
            bonus_credit: bonus,
            total_credit: credit + bonus,
            expiry_days: days,
            status: PlanStatus::Active,
            is_popular: false,
        }
    }

    #[test]
    fn seed_catalog_grant_totals() {
        let catalog = PlanCatalog::default();
        let level1 = catalog.get(1).unwrap();

        assert_eq!(level1.credit_amount, 0);
        assert_eq!(level1.bonus_credit, 200_000);
        assert_eq!(level1.total_credit, 200_000);
        assert_eq!(level1.expiry_days, 30);
    }

    #[test]
    fn inactive_plans_are_not_purchasable() {
        let mut retired = plan(9, 100, 0, 30);
        retired.status = PlanStatus::Inactive;
        let catalog = PlanCatalog::new(vec![retired]).unwrap();

        assert!(matches!(
            catalog.get(9),
            Err(CreditError::UnknownPlanLevel { level: 9 })
        ));
        assert!(catalog.get_any(9).is_some());
    }

    #[test]
    fn mismatched_total_fails_at_load() {
        let mut broken = plan(1, 100, 50, 30);
        broken.total_credit = 999;
        assert!(matches!(
            PlanCatalog::new(vec![broken]),
            Err(CreditError::Configuration(_))
        ));
    }

    #[test]
    fn duplicate_levels_fail_at_load() {
        let result = PlanCatalog::new(vec![plan(1, 100, 0, 30), plan(1, 200, 0, 30)]);
        assert!(matches!(result, Err(CreditError::Configuration(_))));
    }

    #[test]
    fn days_remaining_rounds_up_and_clamps() {
        let now = Utc::now();
        let account_id = AccountId::generate();
        let instance = PlanInstance::new_active(account_id, &plan(1, 100, 0, 30), now);

        assert_eq!(instance.days_remaining(now), 30);
        // Half a day left still counts as one day.
        assert_eq!(
            instance.days_remaining(instance.expires_at - Duration::hours(12)),
            1
        );
        // Past expiry clamps to zero.
        assert_eq!(
            instance.days_remaining(instance.expires_at + Duration::hours(1)),
            0
        );
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let instance = PlanInstance::new_active(AccountId::generate(), &plan(1, 100, 0, 30), now);

        // Not expired at the exact boundary instant.
        assert!(!instance.is_expired(instance.expires_at));
        assert!(instance.is_expired(instance.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn reserved_activation_restarts_window() {
        let now = Utc::now();
        let p = plan(2, 100, 50, 60);
        let mut instance = PlanInstance::new_reserved(AccountId::generate(), &p, now);
        assert!(instance.is_reserved);
        assert!(!instance.is_active);

        let later = now + Duration::days(30);
        instance.activate(later, p.expiry_days);

        assert!(instance.is_active);
        assert!(!instance.is_reserved);
        assert_eq!(instance.expires_at, later + Duration::days(60));
    }
}
