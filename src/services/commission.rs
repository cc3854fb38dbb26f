//! Referral commission arithmetic.
//!
//! The stored rate is a percentage on a 0–100 scale. The recorded commission is
//! the unit price left after deducting that percentage:
//! `unit_price - unit_price * rate / 100`. A rate of 10 on a unit price of 100
//! records 90, not 10. Amounts are integer cents; the deducted share is rounded
//! to the nearest cent, half away from zero. Rates are applied at basis point
//! precision (0.01%) so the arithmetic stays exact for every `i64` price.

use super::ServiceError;

pub const MAX_RATE_PERCENT: f64 = 100.0;

const BASIS_POINTS: i128 = 10_000;

pub fn validate_rate(rate_percent: f64) -> Result<(), ServiceError> {
    if !rate_percent.is_finite() || rate_percent < 0.0 {
        return Err(ServiceError::Validation(format!(
            "Invalid referral commission value: {rate_percent}"
        )));
    }

    Ok(())
}

/// Computes the commission recorded on an order. Never negative: rates of 100
/// and above record zero.
pub fn compute(unit_price_cents: i64, rate_percent: f64) -> Result<i64, ServiceError> {
    validate_rate(rate_percent)?;
    if unit_price_cents < 0 {
        return Err(ServiceError::Validation(
            "Unit price cannot be negative".to_string(),
        ));
    }

    // Finite and non-negative here; `as` saturates absurdly large rates.
    let rate_bp = (rate_percent * 100.0).round() as i128;
    let price = i128::from(unit_price_cents);
    let deduction = (price * rate_bp.min(BASIS_POINTS * 2) + BASIS_POINTS / 2) / BASIS_POINTS;
    let residual = price - deduction;

    if residual < 0 {
        log::warn!(
            "Commission rate {}% exceeds {}%, recording zero commission.",
            rate_percent,
            MAX_RATE_PERCENT
        );
        return Ok(0);
    }

    // 0 <= residual <= unit_price_cents, so it fits.
    Ok(residual as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_keeps_the_unit_price() {
        assert_eq!(compute(12_345, 0.0).unwrap(), 12_345);
    }

    #[test]
    fn ten_percent_of_one_hundred_records_ninety() {
        assert_eq!(compute(100, 10.0).unwrap(), 90);
        assert_eq!(compute(10_000, 10.0).unwrap(), 9_000);
    }

    #[test]
    fn deduction_rounds_half_away_from_zero() {
        // 12.5% of 101 cents is 12.625 cents.
        assert_eq!(compute(101, 12.5).unwrap(), 88);
        // 50% of 1 cent is exactly half a cent.
        assert_eq!(compute(1, 50.0).unwrap(), 0);
    }

    #[test]
    fn is_non_increasing_in_rate() {
        let price = 9_999;
        let mut previous = compute(price, 0.0).unwrap();
        for step in 1..=250 {
            let rate = step as f64 * 0.5;
            let current = compute(price, rate).unwrap();
            assert!(current <= previous, "rate {rate}: {current} > {previous}");
            previous = current;
        }
    }

    #[test]
    fn full_rate_records_zero() {
        assert_eq!(compute(5_000, 100.0).unwrap(), 0);
    }

    // Rates above 100% would make the residual negative; the calculator clamps
    // instead of recording a negative amount.
    #[test]
    fn rate_above_one_hundred_is_clamped_to_zero() {
        assert_eq!(compute(5_000, 150.0).unwrap(), 0);
    }

    #[test]
    fn rejects_negative_and_non_finite_rates() {
        assert!(matches!(compute(100, -1.0), Err(ServiceError::Validation(_))));
        assert!(matches!(compute(100, f64::NAN), Err(ServiceError::Validation(_))));
        assert!(matches!(
            compute(100, f64::INFINITY),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn prices_beyond_f64_precision_stay_exact() {
        let price = (1_i64 << 53) + 1;
        assert_eq!(compute(price, 0.0).unwrap(), price);
        assert_eq!(compute(i64::MAX, 0.0).unwrap(), i64::MAX);
        // 10% of i64::MAX is 922337203685477580.7, rounded up.
        assert_eq!(compute(i64::MAX, 10.0).unwrap(), i64::MAX - 922_337_203_685_477_581);
    }

    #[test]
    fn huge_rates_clamp_without_overflow() {
        assert_eq!(compute(i64::MAX, 1e300).unwrap(), 0);
    }

    #[test]
    fn zero_price_records_zero() {
        assert_eq!(compute(0, 25.0).unwrap(), 0);
    }
}
