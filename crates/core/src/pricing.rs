use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Quantity-indexed bulk discount table. Tiers define a step function: a
/// quantity is priced by its exact tier when one exists, otherwise by the
/// highest tier at or below it. A fixed total configured for an exact
/// quantity takes precedence over the percent lookup at that quantity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountPolicy {
    pub min_quantity: u32,
    pub percent_tiers: BTreeMap<u32, u32>,
    #[serde(default)]
    pub fixed_totals: BTreeMap<u32, Decimal>,
}

impl DiscountPolicy {
    /// Percent for a qualifying quantity: exact tier first, then the
    /// highest configured tier at or below the quantity.
    fn percent_for(&self, quantity: u32) -> u32 {
        self.percent_tiers.range(..=quantity).next_back().map(|(_, pct)| *pct).unwrap_or(0)
    }

    /// Tier percents must be non-decreasing as quantity grows, and every
    /// tier must sit at or above the qualifying minimum.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.min_quantity == 0 {
            return Err(DomainError::InvariantViolation(
                "discount policy min_quantity must be at least 1".to_string(),
            ));
        }

        let mut previous: Option<(u32, u32)> = None;
        for (&tier, &percent) in &self.percent_tiers {
            if tier < self.min_quantity {
                return Err(DomainError::InvariantViolation(format!(
                    "discount tier {tier} is below the qualifying minimum {}",
                    self.min_quantity
                )));
            }
            if percent > 100 {
                return Err(DomainError::InvariantViolation(format!(
                    "discount tier {tier} has percent {percent} above 100"
                )));
            }
            if let Some((prev_tier, prev_percent)) = previous {
                if percent < prev_percent {
                    return Err(DomainError::InvariantViolation(format!(
                        "discount percent decreases from tier {prev_tier} ({prev_percent}%) to tier {tier} ({percent}%)"
                    )));
                }
            }
            previous = Some((tier, percent));
        }

        Ok(())
    }
}

/// A priced line for one quantity of one product. Computed on demand,
/// never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedQuote {
    pub quantity: u32,
    pub subtotal: Decimal,
    pub discount_percent: u32,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub discount_applied: bool,
}

pub trait QuoteCalculator: Send + Sync {
    fn price(&self, quantity: u32, unit_price: Decimal, policy: Option<&DiscountPolicy>)
        -> PricedQuote;
}

#[derive(Clone, Debug, Default)]
pub struct BulkDiscountCalculator;

impl QuoteCalculator for BulkDiscountCalculator {
    fn price(
        &self,
        quantity: u32,
        unit_price: Decimal,
        policy: Option<&DiscountPolicy>,
    ) -> PricedQuote {
        price(quantity, unit_price, policy)
    }
}

/// Price a quantity against an optional discount policy.
///
/// Discount amounts are rounded to the whole currency unit, half away
/// from zero, before the total is derived.
pub fn price(quantity: u32, unit_price: Decimal, policy: Option<&DiscountPolicy>) -> PricedQuote {
    let subtotal = unit_price * Decimal::from(quantity);

    let (discount_percent, discount_amount) = match policy {
        Some(policy) if quantity >= policy.min_quantity => {
            let percent = policy.percent_for(quantity);
            let amount = match policy.fixed_totals.get(&quantity) {
                Some(fixed_total) => (subtotal - fixed_total).max(Decimal::ZERO),
                None => subtotal * Decimal::from(percent) / Decimal::from(100),
            };
            (percent, round_currency(amount))
        }
        _ => (0, Decimal::ZERO),
    };

    let total = round_currency(subtotal - discount_amount);

    PricedQuote {
        quantity,
        subtotal,
        discount_percent,
        discount_amount,
        total,
        discount_applied: discount_amount > Decimal::ZERO,
    }
}

fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
