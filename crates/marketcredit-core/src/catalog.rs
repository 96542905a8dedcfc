//! Activity price catalog.
//!
//! A static mapping from activity key to pricing rule, loaded once at
//! process start and read-only afterwards. Price resolution is a pure
//! function over this table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CreditError, Result};

/// How an activity is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    /// One flat price per consumption, quantity is always 1.
    Fixed,
    /// Price scales linearly with quantity.
    PerUnit,
}

/// A pricing rule for one billable activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPriceRule {
    /// Unique activity key (e.g. `PRODUCT_BOOST`).
    pub activity_key: String,

    /// Fixed or per-unit pricing.
    pub price_type: PriceType,

    /// Price in minor units; the unit price for per-unit rules.
    pub base_price: i64,

    /// Label for the billed unit; present only for per-unit rules.
    pub unit_name: Option<String>,

    /// Whether consuming this activity requires an active plan.
    ///
    /// Plan-gating is a per-rule policy rather than a global switch: most
    /// paid activities require a plan, a few utility activities do not.
    #[serde(default = "default_requires_plan")]
    pub requires_plan: bool,
}

const fn default_requires_plan() -> bool {
    true
}

impl ActivityPriceRule {
    /// Create a fixed-price rule that requires an active plan.
    #[must_use]
    pub fn fixed(activity_key: impl Into<String>, base_price: i64) -> Self {
        Self {
            activity_key: activity_key.into(),
            price_type: PriceType::Fixed,
            base_price,
            unit_name: None,
            requires_plan: true,
        }
    }

    /// Create a per-unit rule that requires an active plan.
    #[must_use]
    pub fn per_unit(
        activity_key: impl Into<String>,
        base_price: i64,
        unit_name: impl Into<String>,
    ) -> Self {
        Self {
            activity_key: activity_key.into(),
            price_type: PriceType::PerUnit,
            base_price,
            unit_name: Some(unit_name.into()),
            requires_plan: true,
        }
    }

    /// Mark the rule as consumable without an active plan.
    #[must_use]
    pub fn without_plan_gate(mut self) -> Self {
        self.requires_plan = false;
        self
    }
}

/// A resolved price for one consumption request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Price of a single unit in minor units.
    pub unit_price: i64,

    /// Total price for the requested quantity in minor units.
    pub total_price: i64,

    /// The pricing mode of the matched rule.
    pub price_type: PriceType,
}

/// Immutable catalog of activity pricing rules.
///
/// Built once at startup; duplicate keys and malformed rules fail fast at
/// load time rather than at resolution time.
#[derive(Debug, Clone)]
pub struct ActivityCatalog {
    rules: HashMap<String, ActivityPriceRule>,
}

impl ActivityCatalog {
    /// Build a catalog from a list of rules.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::Configuration` if two rules share an activity
    /// key, a rule carries a negative base price, or a per-unit rule is
    /// missing its unit name.
    pub fn new(rules: Vec<ActivityPriceRule>) -> Result<Self> {
        let mut map = HashMap::with_capacity(rules.len());
        for rule in rules {
            if rule.base_price < 0 {
                return Err(CreditError::Configuration(format!(
                    "negative base price for activity {}",
                    rule.activity_key
                )));
            }
            if rule.price_type == PriceType::PerUnit && rule.unit_name.is_none() {
                return Err(CreditError::Configuration(format!(
                    "per-unit activity {} is missing a unit name",
                    rule.activity_key
                )));
            }
            if map.contains_key(&rule.activity_key) {
                return Err(CreditError::Configuration(format!(
                    "duplicate activity key in catalog: {}",
                    rule.activity_key
                )));
            }
            map.insert(rule.activity_key.clone(), rule);
        }
        Ok(Self { rules: map })
    }

    /// Look up the rule for an activity key.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::UnknownActivity` if no rule matches.
    pub fn get(&self, activity_key: &str) -> Result<&ActivityPriceRule> {
        self.rules
            .get(activity_key)
            .ok_or_else(|| CreditError::UnknownActivity {
                activity_key: activity_key.to_string(),
            })
    }

    /// Resolve the price for consuming an activity.
    ///
    /// Fixed-price rules bill a single flat price and reject an explicit
    /// quantity above 1. Per-unit rules multiply the unit price by the
    /// quantity.
    ///
    /// # Errors
    ///
    /// - `CreditError::UnknownActivity` if no rule matches the key.
    /// - `CreditError::InvalidQuantity` if the quantity is 0, exceeds 1 for
    ///   a fixed-price rule, or overflows the total.
    pub fn resolve_price(&self, activity_key: &str, quantity: u32) -> Result<PriceQuote> {
        let rule = self.get(activity_key)?;

        if quantity < 1 {
            return Err(CreditError::InvalidQuantity { quantity });
        }

        match rule.price_type {
            PriceType::Fixed => {
                if quantity > 1 {
                    return Err(CreditError::InvalidQuantity { quantity });
                }
                Ok(PriceQuote {
                    unit_price: rule.base_price,
                    total_price: rule.base_price,
                    price_type: PriceType::Fixed,
                })
            }
            PriceType::PerUnit => {
                let total = rule
                    .base_price
                    .checked_mul(i64::from(quantity))
                    .ok_or(CreditError::InvalidQuantity { quantity })?;
                Ok(PriceQuote {
                    unit_price: rule.base_price,
                    total_price: total,
                    price_type: PriceType::PerUnit,
                })
            }
        }
    }

    /// All rules in the catalog, in arbitrary order.
    pub fn rules(&self) -> impl Iterator<Item = &ActivityPriceRule> {
        self.rules.values()
    }
}

impl Default for ActivityCatalog {
    /// The production activity price table.
    fn default() -> Self {
        Self::new(vec![
            ActivityPriceRule::fixed("PRODUCT_BOOST", 30_000),
            ActivityPriceRule::fixed("TOP_SEARCH_PLACEMENT", 50_000),
            ActivityPriceRule::per_unit("SEND_BROADCAST", 5_000, "recipient"),
            ActivityPriceRule::per_unit("EXTRA_PRODUCT_SLOT", 2_000, "listing"),
            ActivityPriceRule::fixed("MARKET_REPORT", 20_000).without_plan_gate(),
        ])
        .expect("static activity catalog is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_price_ignores_unit_scaling() {
        let catalog = ActivityCatalog::default();
        let quote = catalog.resolve_price("PRODUCT_BOOST", 1).unwrap();

        assert_eq!(quote.total_price, 30_000);
        assert_eq!(quote.unit_price, 30_000);
        assert_eq!(quote.price_type, PriceType::Fixed);
    }

    #[test]
    fn fixed_price_rejects_explicit_quantity() {
        let catalog = ActivityCatalog::default();
        let err = catalog.resolve_price("PRODUCT_BOOST", 2).unwrap_err();
        assert!(matches!(err, CreditError::InvalidQuantity { quantity: 2 }));
    }

    #[test]
    fn per_unit_price_scales_with_quantity() {
        let catalog = ActivityCatalog::default();
        let quote = catalog.resolve_price("SEND_BROADCAST", 3).unwrap();

        assert_eq!(quote.unit_price, 5_000);
        assert_eq!(quote.total_price, 15_000);
        assert_eq!(quote.price_type, PriceType::PerUnit);
    }

    #[test]
    fn zero_quantity_rejected() {
        let catalog = ActivityCatalog::default();
        let err = catalog.resolve_price("SEND_BROADCAST", 0).unwrap_err();
        assert!(matches!(err, CreditError::InvalidQuantity { quantity: 0 }));
    }

    #[test]
    fn unknown_activity_rejected() {
        let catalog = ActivityCatalog::default();
        let err = catalog.resolve_price("NOT_AN_ACTIVITY", 1).unwrap_err();
        assert!(matches!(err, CreditError::UnknownActivity { .. }));
    }

    #[test]
    fn duplicate_keys_fail_at_load() {
        let result = ActivityCatalog::new(vec![
            ActivityPriceRule::fixed("PRODUCT_BOOST", 30_000),
            ActivityPriceRule::fixed("PRODUCT_BOOST", 40_000),
        ]);
        assert!(matches!(result, Err(CreditError::Configuration(_))));
    }

    #[test]
    fn per_unit_without_unit_name_fails_at_load() {
        let rule = ActivityPriceRule {
            activity_key: "BROKEN".into(),
            price_type: PriceType::PerUnit,
            base_price: 100,
            unit_name: None,
            requires_plan: true,
        };
        assert!(matches!(
            ActivityCatalog::new(vec![rule]),
            Err(CreditError::Configuration(_))
        ));
    }

    #[test]
    fn plan_gate_flag_per_rule() {
        let catalog = ActivityCatalog::default();
        assert!(catalog.get("PRODUCT_BOOST").unwrap().requires_plan);
        assert!(!catalog.get("MARKET_REPORT").unwrap().requires_plan);
    }

    #[test]
    fn rules_load_from_json_config() {
        let json = r#"[
            {"activity_key": "CUSTOM", "price_type": "per_unit", "base_price": 10, "unit_name": "item"}
        ]"#;
        let rules: Vec<ActivityPriceRule> = serde_json::from_str(json).unwrap();
        let catalog = ActivityCatalog::new(rules).unwrap();

        let quote = catalog.resolve_price("CUSTOM", 4).unwrap();
        assert_eq!(quote.total_price, 40);
        assert!(catalog.get("CUSTOM").unwrap().requires_plan); // serde default
    }
}
