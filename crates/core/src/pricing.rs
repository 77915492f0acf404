//! Group pricing.
//!
//! Amounts are minor currency units. The discount is floored, so rounding
//! always favours the customer by less than one unit.

use eventix_common::config::DiscountTier;
use eventix_common::{AppError, AppResult};
use serde::Serialize;

/// Prices stored on a group registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPricing {
    pub base_price: i64,
    pub participant_count: i32,
    pub group_discount_percent: i32,
    pub discount_amount: i64,
    pub final_price: i64,
}

impl GroupPricing {
    /// Price `participant_count` seats at `base_price` with a percentage discount.
    pub fn compute(
        base_price: i64,
        participant_count: i32,
        group_discount_percent: i32,
    ) -> AppResult<Self> {
        if base_price < 0 {
            return Err(AppError::BadRequest("basePrice must not be negative".to_string()));
        }
        if participant_count <= 0 {
            return Err(AppError::BadRequest(
                "participant count must be positive".to_string(),
            ));
        }
        if !(0..=100).contains(&group_discount_percent) {
            return Err(AppError::BadRequest(format!(
                "group discount must be between 0 and 100, got {group_discount_percent}"
            )));
        }

        let overflow = || AppError::BadRequest("group price is too large".to_string());

        let gross = base_price
            .checked_mul(i64::from(participant_count))
            .ok_or_else(overflow)?;
        let discount_amount = gross
            .checked_mul(i64::from(group_discount_percent))
            .ok_or_else(overflow)?
            / 100;

        Ok(Self {
            base_price,
            participant_count,
            group_discount_percent,
            discount_amount,
            final_price: gross - discount_amount,
        })
    }

    /// `base_price × participant_count`.
    #[must_use]
    pub const fn gross(&self) -> i64 {
        self.discount_amount + self.final_price
    }
}

/// Discount of the highest tier whose minimum `participant_count` reaches.
#[must_use]
pub fn tier_discount(tiers: &[DiscountTier], participant_count: i32) -> i32 {
    tiers
        .iter()
        .filter(|tier| tier.min_participants <= participant_count)
        .max_by_key(|tier| tier.min_participants)
        .map_or(0, |tier| tier.percent)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn default_tiers() -> Vec<DiscountTier> {
        vec![
            DiscountTier {
                min_participants: 5,
                percent: 5,
            },
            DiscountTier {
                min_participants: 10,
                percent: 10,
            },
            DiscountTier {
                min_participants: 20,
                percent: 15,
            },
        ]
    }

    #[test]
    fn test_compute_floors_discount() {
        // 3 x 333 = 999, 10% = 99.9 -> 99
        let pricing = GroupPricing::compute(333, 3, 10).unwrap();
        assert_eq!(pricing.discount_amount, 99);
        assert_eq!(pricing.final_price, 900);
    }

    #[test]
    fn test_compute_without_discount() {
        let pricing = GroupPricing::compute(5000, 4, 0).unwrap();
        assert_eq!(pricing.discount_amount, 0);
        assert_eq!(pricing.final_price, 20_000);
    }

    #[test]
    fn test_compute_rejects_bad_input() {
        assert!(matches!(
            GroupPricing::compute(-1, 4, 0),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            GroupPricing::compute(100, 0, 0),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            GroupPricing::compute(100, 4, 101),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_compute_overflow_is_bad_request() {
        assert!(matches!(
            GroupPricing::compute(i64::MAX, 2, 0),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_tier_discount() {
        let tiers = default_tiers();
        assert_eq!(tier_discount(&tiers, 1), 0);
        assert_eq!(tier_discount(&tiers, 5), 5);
        assert_eq!(tier_discount(&tiers, 19), 10);
        assert_eq!(tier_discount(&tiers, 20), 15);
        assert_eq!(tier_discount(&tiers, 500), 15);
        assert_eq!(tier_discount(&[], 50), 0);
    }

    proptest! {
        #[test]
        fn prop_discount_and_final_sum_to_gross(
            base in 0..10_000_000i64,
            count in 1..=500i32,
            pct in 0..=100i32,
        ) {
            let pricing = GroupPricing::compute(base, count, pct).unwrap();
            prop_assert_eq!(pricing.gross(), base * i64::from(count));
            prop_assert!(pricing.discount_amount >= 0);
            prop_assert!(pricing.final_price >= 0);
        }
    }
}
