//! Annualised investment costs.
use crate::units::{Dimensionless, MoneyPerCapacity, UnitType};
use anyhow::{Result, ensure};

/// Calculates the capital recovery factor (CRF) for a given lifetime and cost of capital.
///
/// The CRF converts a one-off capital cost into an equivalent annual payment over the lifetime of
/// an asset. With a zero cost of capital it degenerates to `1 / lifetime`. For very long
/// lifetimes it tends to `wacc`.
///
/// Callers must check that `lifetime` is at least one and `wacc` is in `[0, 1]`.
fn capital_recovery_factor(lifetime: u32, wacc: Dimensionless) -> Dimensionless {
    if wacc == Dimensionless(0.0) {
        return Dimensionless(1.0 / f64::from(lifetime));
    }

    // wacc * f / (f - 1), written so that an infinite f gives wacc
    let factor = (Dimensionless(1.0) + wacc).powf(f64::from(lifetime));
    Dimensionless(wacc.0 / (1.0 - factor.0.recip()))
}

/// The annuity for a capital cost paid back over `lifetime` years at a cost of capital `wacc`.
///
/// # Returns
///
/// The annual payment, or an error if `lifetime` is zero or `wacc` is outside `[0, 1]`.
pub fn annuity(
    capex: MoneyPerCapacity,
    lifetime: u32,
    wacc: Dimensionless,
) -> Result<MoneyPerCapacity> {
    ensure!(lifetime >= 1, "Lifetime must be at least one year");
    ensure!(
        wacc.is_finite() && (0.0..=1.0).contains(&wacc.0),
        "Cost of capital must be between 0 and 1, got {wacc}"
    );

    Ok(capex * capital_recovery_factor(lifetime, wacc))
}

/// The equivalent periodical costs of one unit of capacity.
///
/// This is the annuity of the capital cost plus a fixed operating cost expressed as a fraction of
/// the capital cost.
///
/// # Arguments
///
/// * `capex` - Capital cost per unit of capacity
/// * `lifetime` - Technical lifetime in years
/// * `opex` - Annual operating cost as a fraction of `capex`
/// * `wacc` - Weighted average cost of capital
pub fn ep_costs(
    capex: MoneyPerCapacity,
    lifetime: u32,
    opex: Dimensionless,
    wacc: Dimensionless,
) -> Result<MoneyPerCapacity> {
    ensure!(
        opex.is_finite() && opex >= Dimensionless(0.0),
        "Operating cost fraction must be a finite number greater than or equal to zero"
    );

    Ok(annuity(capex, lifetime, wacc)? + capex * opex)
}
