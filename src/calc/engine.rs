//! Pure calculation functions over auction records
//!
//! No I/O crosses this boundary. All monetary and percentage arithmetic is
//! `Decimal`; the day-count convention is actual/365, fixed and not
//! configurable per call.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::common::errors::{PipelineError, Result};
use crate::common::types::AuctionRecord;

use super::types::{CalculationInput, CalculationResult, TaxPolicy};

const DAYS_IN_YEAR: Decimal = dec!(365);

/// Evaluate one record against one input.
///
/// Routes to the held-to-maturity or the secondary-sale path depending on
/// `sale_date`. A sale date equal to the maturity date is evaluated on the
/// held-to-maturity path so the two scenarios agree at the boundary.
pub fn evaluate(
    record: &AuctionRecord,
    input: &CalculationInput,
    tax: &TaxPolicy,
) -> Result<CalculationResult> {
    validate(record, input, tax)?;

    match input.sale_date {
        None => Ok(held_to_maturity(record, input, tax)),
        Some(sale_date) if sale_date == record.maturity_date() => {
            Ok(held_to_maturity(record, input, tax))
        }
        Some(sale_date) => {
            // validate() guarantees the yield is present
            let market_yield = input.prevailing_market_yield.ok_or_else(|| {
                PipelineError::InvalidCalculationInput(
                    "prevailing_market_yield is required for a secondary sale".to_string(),
                )
            })?;
            Ok(secondary_sale(record, input, tax, sale_date, market_yield))
        }
    }
}

fn validate(record: &AuctionRecord, input: &CalculationInput, tax: &TaxPolicy) -> Result<()> {
    if input.investment_amount <= Decimal::ZERO {
        return Err(PipelineError::InvalidCalculationInput(format!(
            "investment_amount must be positive, got {}",
            input.investment_amount
        )));
    }
    if record.accepted_yield <= Decimal::ZERO {
        return Err(PipelineError::InvalidCalculationInput(format!(
            "record yield must be positive, got {}",
            record.accepted_yield
        )));
    }
    if tax.rate < Decimal::ZERO || tax.rate > Decimal::ONE {
        return Err(PipelineError::InvalidCalculationInput(format!(
            "tax rate must be within [0, 1], got {}",
            tax.rate
        )));
    }

    if let Some(sale_date) = input.sale_date {
        let maturity = record.maturity_date();
        if sale_date <= record.auction_date || sale_date > maturity {
            return Err(PipelineError::InvalidCalculationInput(format!(
                "sale_date {sale_date} must fall after issue {} and not after maturity {maturity}",
                record.auction_date
            )));
        }
        if sale_date < maturity {
            match input.prevailing_market_yield {
                None => {
                    return Err(PipelineError::InvalidCalculationInput(
                        "prevailing_market_yield is required for a secondary sale".to_string(),
                    ))
                }
                Some(market_yield) if market_yield <= Decimal::ZERO => {
                    return Err(PipelineError::InvalidCalculationInput(format!(
                        "prevailing_market_yield must be positive, got {market_yield}"
                    )))
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

/// Buy at auction, hold until redemption
fn held_to_maturity(
    record: &AuctionRecord,
    input: &CalculationInput,
    tax: &TaxPolicy,
) -> CalculationResult {
    let tenor_days = Decimal::from(record.tenor.days());

    let gross_return =
        input.investment_amount * record.accepted_yield * tenor_days / DAYS_IN_YEAR;
    let tax_amount = gross_return * tax.rate;
    let net_profit = gross_return - tax_amount;
    let effective_annualized_yield =
        net_profit / input.investment_amount * DAYS_IN_YEAR / tenor_days;

    CalculationResult {
        gross_return,
        tax_amount,
        net_profit,
        effective_annualized_yield,
        early_sale_price: None,
        gain_or_loss: None,
    }
}

/// Sell on the secondary market before maturity at the price implied by the
/// prevailing market yield
fn secondary_sale(
    record: &AuctionRecord,
    input: &CalculationInput,
    tax: &TaxPolicy,
    sale_date: chrono::NaiveDate,
    market_yield: Decimal,
) -> CalculationResult {
    let holding_days = Decimal::from((sale_date - record.auction_date).num_days());
    let remaining_days = Decimal::from((record.maturity_date() - sale_date).num_days());

    // Discounted-price convention at the prevailing yield
    let early_sale_price = Decimal::ONE_HUNDRED
        / (Decimal::ONE + market_yield * remaining_days / DAYS_IN_YEAR);

    let face_value = input.investment_amount / record.price_per_100 * Decimal::ONE_HUNDRED;
    let sale_proceeds = face_value * early_sale_price / Decimal::ONE_HUNDRED;
    let gain_or_loss = sale_proceeds - input.investment_amount;

    // Tax applies only to a realized gain, never refunds a loss
    let taxable = gain_or_loss.max(Decimal::ZERO);
    let tax_amount = taxable * tax.rate;
    let net_profit = gain_or_loss - tax_amount;
    let effective_annualized_yield =
        net_profit / input.investment_amount * DAYS_IN_YEAR / holding_days;

    CalculationResult {
        gross_return: gain_or_loss,
        tax_amount,
        net_profit,
        effective_annualized_yield,
        early_sale_price: Some(early_sale_price),
        gain_or_loss: Some(gain_or_loss),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn record(accepted_yield: Decimal, tenor: crate::common::types::Tenor) -> AuctionRecord {
        // Price consistent with the discount convention at the accepted yield
        let tenor_days = Decimal::from(tenor.days());
        let price = Decimal::ONE_HUNDRED
            / (Decimal::ONE + accepted_yield * tenor_days / DAYS_IN_YEAR);
        AuctionRecord {
            auction_date: NaiveDate::from_ymd_opt(2024, 7, 25).unwrap(),
            tenor,
            accepted_yield,
            price_per_100: price.round_dp(6),
            total_accepted_amount: dec!(1_000_000_000),
            ingested_at: Utc::now(),
        }
    }

    fn approx_eq(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn held_to_maturity_matches_reference_figures() {
        let rec = record(dec!(0.25), crate::common::types::Tenor::Days364);
        let input = CalculationInput::held_to_maturity(dec!(1000));
        let result = evaluate(&rec, &input, &TaxPolicy::new(dec!(0.20))).unwrap();

        // 1000 * 0.25 * (364/365) * 0.80
        let expected_net = dec!(1000) * dec!(0.25) * dec!(364) / dec!(365) * dec!(0.80);
        assert!(approx_eq(result.net_profit, expected_net, dec!(0.0001)));
        assert!(approx_eq(
            result.gross_return,
            dec!(1000) * dec!(0.25) * dec!(364) / dec!(365),
            dec!(0.0001)
        ));
        assert_eq!(result.tax_amount, result.gross_return - result.net_profit);
        assert!(result.early_sale_price.is_none());
        assert!(result.gain_or_loss.is_none());
    }

    #[test]
    fn held_to_maturity_is_internally_consistent() {
        let rec = record(dec!(0.275), crate::common::types::Tenor::Days91);
        let input = CalculationInput::held_to_maturity(dec!(100_000));
        let result = evaluate(&rec, &input, &TaxPolicy::standard()).unwrap();

        assert_eq!(result.net_profit, result.gross_return - result.tax_amount);
        assert_eq!(result.tax_amount, result.gross_return * dec!(0.20));
        assert!(result.effective_annualized_yield > Decimal::ZERO);
        // Net annualized yield stays below the gross accepted yield
        assert!(result.effective_annualized_yield < rec.accepted_yield);
    }

    #[test]
    fn zero_tax_leaves_gross_untouched() {
        let rec = record(dec!(0.25), crate::common::types::Tenor::Days182);
        let input = CalculationInput::held_to_maturity(dec!(50_000));
        let result = evaluate(&rec, &input, &TaxPolicy::new(Decimal::ZERO)).unwrap();

        assert_eq!(result.tax_amount, Decimal::ZERO);
        assert_eq!(result.net_profit, result.gross_return);
    }

    #[test]
    fn sale_at_maturity_equals_held_to_maturity() {
        let rec = record(dec!(0.25), crate::common::types::Tenor::Days364);
        let tax = TaxPolicy::standard();
        let held = evaluate(
            &rec,
            &CalculationInput::held_to_maturity(dec!(1000)),
            &tax,
        )
        .unwrap();
        let at_maturity = evaluate(
            &rec,
            &CalculationInput::secondary_sale(dec!(1000), rec.maturity_date(), dec!(0.23)),
            &tax,
        )
        .unwrap();

        assert_eq!(held, at_maturity);
    }

    #[test]
    fn profitable_early_sale_when_market_yield_drops() {
        // Bought at 25%, market now trades at 23%: the bill gained value
        let rec = record(dec!(0.25), crate::common::types::Tenor::Days364);
        let sale_date = rec.auction_date + Duration::days(90);
        let input = CalculationInput::secondary_sale(dec!(100_000), sale_date, dec!(0.23));
        let result = evaluate(&rec, &input, &TaxPolicy::standard()).unwrap();

        let gain = result.gain_or_loss.unwrap();
        assert!(gain > Decimal::ZERO);
        assert!(result.tax_amount > Decimal::ZERO);
        assert_eq!(result.net_profit, gain - result.tax_amount);
        assert!(result.early_sale_price.unwrap() > rec.price_per_100);
    }

    #[test]
    fn losing_early_sale_pays_no_tax() {
        // Market yield rose to 35%: selling early realizes a loss
        let rec = record(dec!(0.25), crate::common::types::Tenor::Days364);
        let sale_date = rec.auction_date + Duration::days(90);
        let input = CalculationInput::secondary_sale(dec!(100_000), sale_date, dec!(0.35));
        let result = evaluate(&rec, &input, &TaxPolicy::standard()).unwrap();

        let gain = result.gain_or_loss.unwrap();
        assert!(gain < Decimal::ZERO);
        assert_eq!(result.tax_amount, Decimal::ZERO);
        assert_eq!(result.net_profit, gain);
    }

    #[test]
    fn rejects_non_positive_investment() {
        let rec = record(dec!(0.25), crate::common::types::Tenor::Days91);
        for amount in [Decimal::ZERO, dec!(-1000)] {
            let err = evaluate(
                &rec,
                &CalculationInput::held_to_maturity(amount),
                &TaxPolicy::standard(),
            )
            .unwrap_err();
            assert!(matches!(err, PipelineError::InvalidCalculationInput(_)));
        }
    }

    #[test]
    fn rejects_sale_date_outside_holding_window() {
        let rec = record(dec!(0.25), crate::common::types::Tenor::Days91);
        let too_early = rec.auction_date;
        let too_late = rec.maturity_date() + Duration::days(1);

        for sale_date in [too_early, too_late] {
            let input = CalculationInput::secondary_sale(dec!(1000), sale_date, dec!(0.23));
            assert!(evaluate(&rec, &input, &TaxPolicy::standard()).is_err());
        }
    }

    #[test]
    fn rejects_secondary_sale_without_market_yield() {
        let rec = record(dec!(0.25), crate::common::types::Tenor::Days364);
        let input = CalculationInput {
            investment_amount: dec!(1000),
            sale_date: Some(rec.auction_date + Duration::days(30)),
            prevailing_market_yield: None,
        };
        let err = evaluate(&rec, &input, &TaxPolicy::standard()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCalculationInput(_)));
    }

    #[test]
    fn rejects_out_of_range_tax_rate() {
        let rec = record(dec!(0.25), crate::common::types::Tenor::Days91);
        let input = CalculationInput::held_to_maturity(dec!(1000));
        for rate in [dec!(-0.05), dec!(1.5)] {
            assert!(evaluate(&rec, &input, &TaxPolicy::new(rate)).is_err());
        }
    }

    #[test]
    fn full_tax_consumes_entire_gross_return() {
        let rec = record(dec!(0.25), crate::common::types::Tenor::Days182);
        let input = CalculationInput::held_to_maturity(dec!(10_000));
        let result = evaluate(&rec, &input, &TaxPolicy::new(Decimal::ONE)).unwrap();

        assert_eq!(result.tax_amount, result.gross_return);
        assert_eq!(result.net_profit, Decimal::ZERO);
    }
}
