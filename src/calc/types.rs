//! Calculation input/output types

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Tax treatment applied to returns
///
/// A single flat rate as currently observed from the source's jurisdiction.
/// If the authority ever runs multiple concurrent conventions, this grows an
/// explicit convention field; callers already pass the policy per call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxPolicy {
    /// Tax rate as a fraction of the taxable return
    pub rate: Decimal,
}

impl TaxPolicy {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }

    /// The standard 20% withholding on T-bill returns
    pub fn standard() -> Self {
        Self { rate: dec!(0.20) }
    }
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Investor-supplied parameters for one calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationInput {
    /// Amount invested at auction, EGP
    pub investment_amount: Decimal,
    /// Early-exit date for the secondary-market scenario
    #[serde(default)]
    pub sale_date: Option<NaiveDate>,
    /// Prevailing market yield (fraction) at the sale date; required
    /// together with `sale_date`
    #[serde(default)]
    pub prevailing_market_yield: Option<Decimal>,
}

impl CalculationInput {
    /// Hold-to-maturity scenario
    pub fn held_to_maturity(investment_amount: Decimal) -> Self {
        Self {
            investment_amount,
            sale_date: None,
            prevailing_market_yield: None,
        }
    }

    /// Early-sale scenario at the prevailing market yield
    pub fn secondary_sale(
        investment_amount: Decimal,
        sale_date: NaiveDate,
        prevailing_market_yield: Decimal,
    ) -> Self {
        Self {
            investment_amount,
            sale_date: Some(sale_date),
            prevailing_market_yield: Some(prevailing_market_yield),
        }
    }
}

/// Derived figures for one record + one input; transient, never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    /// Return before tax, EGP
    pub gross_return: Decimal,
    /// Tax withheld, EGP
    pub tax_amount: Decimal,
    /// Return after tax, EGP
    pub net_profit: Decimal,
    /// Net profit annualized over the holding period, as a fraction
    pub effective_annualized_yield: Decimal,
    /// Secondary-market scenarios only: implied sale price per 100 face
    #[serde(default)]
    pub early_sale_price: Option<Decimal>,
    /// Secondary-market scenarios only: realized gain or loss, EGP
    #[serde(default)]
    pub gain_or_loss: Option<Decimal>,
}
