//! Risk-based bracket construction
//!
//! A filled entry of `Q` shares at `F` is protected by one stop and one
//! target per configured leg. Prices are expressed in multiples of the
//! per-share risk:
//!
//! ```text
//!   stop     = F - sign * stop_multiple * unit_risk
//!   target_i = F + sign * multiple_i    * unit_risk
//! ```
//!
//! Every price is rounded to the tick, kept at least one tick from `F`, and
//! floored at `min_price`.

use meridian_core::{ConfigurationError, Direction, Price, Shares};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::rounding::{TICK, round_to_tick, round_to_tick_directed};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BracketError {
    #[error("Fill price {price} too low to bracket")]
    PriceTooLow { price: Price },

    #[error("Cannot bracket zero shares")]
    ZeroQuantity,

    #[error("No target legs configured")]
    NoTargets,

    #[error("Target weights sum to zero")]
    ZeroWeight,

    #[error("Per-share risk must be positive")]
    NonPositiveRisk,
}

impl BracketError {
    pub fn sub_code(&self) -> u32 {
        match self {
            BracketError::PriceTooLow { .. } => 1,
            BracketError::ZeroQuantity => 2,
            BracketError::NoTargets => 3,
            BracketError::ZeroWeight => 4,
            BracketError::NonPositiveRisk => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetLeg {
    /// Target distance in units of per-share risk
    pub multiple: Decimal,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl TargetLeg {
    pub fn new(multiple: Decimal, weight: u32) -> Self {
        Self { multiple, weight }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BracketPolicy {
    pub stop_multiple: Decimal,
    pub targets: Vec<TargetLeg>,
    pub tick: Price,
    /// Lowest price any leg may carry
    pub min_price: Price,
}

impl Default for BracketPolicy {
    fn default() -> Self {
        Self {
            stop_multiple: Decimal::ONE,
            targets: vec![TargetLeg::new(Decimal::TWO, 1)],
            tick: TICK,
            min_price: dec!(0.02),
        }
    }
}

/// One stop/target pair sharing a leg index within the OCA group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketLeg {
    pub leg: u16,
    pub quantity: Shares,
    pub stop_price: Price,
    pub target_price: Price,
}

/// Risk per share when `risk_amount` is spread over `quantity` shares
pub fn unit_risk(risk_amount: Price, quantity: Shares) -> Result<Price, BracketError> {
    if quantity == 0 {
        return Err(BracketError::ZeroQuantity);
    }
    if risk_amount <= Decimal::ZERO {
        return Err(BracketError::NonPositiveRisk);
    }
    Ok(risk_amount / Decimal::from(quantity))
}

impl BracketPolicy {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |msg: String| Err(ConfigurationError::InvalidStrategy(msg));

        if self.stop_multiple <= Decimal::ZERO {
            return invalid(format!("stop_multiple {} must be positive", self.stop_multiple));
        }
        if self.targets.is_empty() {
            return invalid("at least one target leg is required".to_string());
        }
        if let Some(t) = self.targets.iter().find(|t| t.multiple <= Decimal::ZERO) {
            return invalid(format!("target multiple {} must be positive", t.multiple));
        }
        if self.targets.iter().all(|t| t.weight == 0) {
            return invalid("target weights sum to zero".to_string());
        }
        if self.tick <= Decimal::ZERO {
            return invalid(format!("tick {} must be positive", self.tick));
        }
        if self.min_price < Decimal::ZERO {
            return invalid(format!("min_price {} is negative", self.min_price));
        }
        Ok(())
    }

    /// Split `quantity` across the target legs; the last leg takes the
    /// remainder and legs that round to zero are dropped
    pub fn split_quantity(&self, quantity: Shares) -> Result<Vec<(usize, Shares)>, BracketError> {
        if self.targets.is_empty() {
            return Err(BracketError::NoTargets);
        }
        let total: u64 = self.targets.iter().map(|t| u64::from(t.weight)).sum();
        if total == 0 {
            return Err(BracketError::ZeroWeight);
        }

        let last = self.targets.len() - 1;
        let mut assigned: Shares = 0;
        let mut split = Vec::with_capacity(self.targets.len());
        for (i, target) in self.targets.iter().enumerate() {
            let q = if i == last {
                quantity - assigned
            } else {
                // Bounded by quantity since weight <= total
                (u64::from(quantity) * u64::from(target.weight) / total) as Shares
            };
            assigned += q;
            if q > 0 {
                split.push((i, q));
            }
        }
        Ok(split)
    }

    /// Stop and target legs for `quantity` shares filled at `fill`
    pub fn build(
        &self,
        direction: Direction,
        fill: Price,
        quantity: Shares,
        unit_risk: Price,
        first_leg: u16,
    ) -> Result<Vec<BracketLeg>, BracketError> {
        if quantity == 0 {
            return Err(BracketError::ZeroQuantity);
        }
        if unit_risk <= Decimal::ZERO {
            return Err(BracketError::NonPositiveRisk);
        }
        if fill <= self.min_price + self.tick {
            return Err(BracketError::PriceTooLow { price: fill });
        }

        let sign = direction.sign();
        let long = direction == Direction::Long;
        let stop_price = self.leg_price(fill - sign * self.stop_multiple * unit_risk, fill, !long);

        let legs = self
            .split_quantity(quantity)?
            .into_iter()
            .zip(first_leg..)
            .map(|((i, q), leg)| BracketLeg {
                leg,
                quantity: q,
                stop_price,
                target_price: self.leg_price(
                    fill + sign * self.targets[i].multiple * unit_risk,
                    fill,
                    long,
                ),
            })
            .collect();
        Ok(legs)
    }

    /// Round `raw`, keep it a tick beyond `fill` on the `above` side, floor it
    fn leg_price(&self, raw: Price, fill: Price, above: bool) -> Price {
        let rounded = round_to_tick(raw, self.tick);
        let price = if above {
            rounded.max(round_to_tick_directed(fill + self.tick, true, self.tick))
        } else {
            rounded.min(round_to_tick_directed(fill - self.tick, false, self.tick))
        };
        price.max(self.min_price)
    }
}
