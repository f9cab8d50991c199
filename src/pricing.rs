//! Order price computation.
//!
//! All amounts are integers in the smallest currency unit, so the whole
//! pipeline stays in exact integer arithmetic. The tax rate is expressed in
//! basis points (1000 = 10%); a fractional tax amount floors toward zero.
//! Every step is checked; a result that does not fit in `i64` comes back as
//! `None` instead of wrapping.

/// Pricing knobs applied to every checkout, loaded from the environment.
#[derive(Debug, Clone, Copy)]
pub struct PricingConfig {
    /// Flat shipping amount added to every order.
    pub shipping_flat_cost: i64,
    /// Tax rate in basis points of the subtotal.
    pub tax_rate_bps: i64,
}

/// The totals of one order, computed before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub tax_amount: i64,
    pub total_amount: i64,
}

impl PriceBreakdown {
    /// `total_amount = subtotal + shipping_cost + tax_amount`, always.
    /// `None` when the arithmetic would overflow `i64`.
    pub fn compute(subtotal: i64, config: &PricingConfig) -> Option<Self> {
        let tax_amount = subtotal.checked_mul(config.tax_rate_bps)? / 10_000;
        let shipping_cost = config.shipping_flat_cost;
        let total_amount = subtotal.checked_add(shipping_cost)?.checked_add(tax_amount)?;
        Some(Self {
            subtotal,
            shipping_cost,
            tax_amount,
            total_amount,
        })
    }
}

/// One cart line's contribution to the subtotal, or `None` on overflow.
pub fn line_total(unit_price: i64, quantity: i32) -> Option<i64> {
    unit_price.checked_mul(i64::from(quantity))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: PricingConfig = PricingConfig {
        shipping_flat_cost: 15_000,
        tax_rate_bps: 1_000,
    };

    #[test]
    fn prices_a_two_line_cart() {
        // 2 x 50000 + 1 x 30000
        let subtotal = line_total(50_000, 2).unwrap() + line_total(30_000, 1).unwrap();
        assert_eq!(subtotal, 130_000);

        let breakdown = PriceBreakdown::compute(subtotal, &CONFIG).unwrap();
        assert_eq!(breakdown.shipping_cost, 15_000);
        assert_eq!(breakdown.tax_amount, 13_000);
        assert_eq!(breakdown.total_amount, 158_000);
    }

    #[test]
    fn zero_subtotal_still_pays_shipping() {
        let breakdown = PriceBreakdown::compute(0, &CONFIG).unwrap();
        assert_eq!(breakdown.tax_amount, 0);
        assert_eq!(breakdown.total_amount, 15_000);
    }

    #[test]
    fn fractional_tax_floors() {
        // 10% of 99 is 9.9; integer pricing floors to 9.
        let breakdown = PriceBreakdown::compute(99, &CONFIG).unwrap();
        assert_eq!(breakdown.tax_amount, 9);
        assert_eq!(breakdown.total_amount, 99 + 15_000 + 9);
    }

    #[test]
    fn total_is_sum_of_parts() {
        for subtotal in [0, 1, 99, 130_000, 7_777_777] {
            let b = PriceBreakdown::compute(subtotal, &CONFIG).unwrap();
            assert_eq!(b.total_amount, b.subtotal + b.shipping_cost + b.tax_amount);
        }
    }

    #[test]
    fn overflowing_line_total_is_refused() {
        assert_eq!(line_total(i64::MAX, 2), None);
        assert_eq!(line_total(i64::MAX, 1), Some(i64::MAX));
    }

    #[test]
    fn overflowing_totals_are_refused() {
        assert!(PriceBreakdown::compute(i64::MAX, &CONFIG).is_none());
    }

    #[test]
    fn zero_rate_config_charges_no_tax() {
        let config = PricingConfig {
            shipping_flat_cost: 0,
            tax_rate_bps: 0,
        };
        let breakdown = PriceBreakdown::compute(42_000, &config).unwrap();
        assert_eq!(breakdown.tax_amount, 0);
        assert_eq!(breakdown.total_amount, 42_000);
    }
}
