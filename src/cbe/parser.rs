//! Parser/normalizer for the CBE auction listing
//!
//! The results table is located by its headers, not by position in the
//! document, and the header-to-field mapping is a declared, inspectable
//! value. Column reordering therefore still parses, while a renamed or
//! missing column surfaces as schema drift instead of silent misalignment.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::common::errors::{PipelineError, Result};
use crate::common::types::{AuctionRecord, NaturalKey, RawPayload, Tenor};

/// Record field a table column can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    AuctionDate,
    TenorDays,
    AcceptedYield,
    PricePer100,
    TotalAcceptedAmount,
}

impl Field {
    const ALL: [Field; 5] = [
        Field::AuctionDate,
        Field::TenorDays,
        Field::AcceptedYield,
        Field::PricePer100,
        Field::TotalAcceptedAmount,
    ];

    fn name(self) -> &'static str {
        match self {
            Field::AuctionDate => "auction_date",
            Field::TenorDays => "tenor_days",
            Field::AcceptedYield => "accepted_yield",
            Field::PricePer100 => "price_per_100",
            Field::TotalAcceptedAmount => "total_accepted_amount",
        }
    }

    /// Lowercased substrings that identify this field's column header.
    /// The listing is published in Arabic with an English variant, so both
    /// header sets are recognized.
    fn markers(self) -> &'static [&'static str] {
        match self {
            Field::AuctionDate => &["session date", "تاريخ الجلسة"],
            Field::TenorDays => &["tenor", "الأجل"],
            Field::AcceptedYield => &["yield", "العائد"],
            Field::PricePer100 => &["price", "السعر"],
            Field::TotalAcceptedAmount => &["amount", "المبالغ"],
        }
    }
}

/// Declared header-to-field mapping for the results table
#[derive(Debug, Clone, Default)]
pub struct HeaderMap;

impl HeaderMap {
    /// Resolve headers to column indexes; every field must be present
    fn resolve(&self, headers: &[String]) -> std::result::Result<ColumnIndex, String> {
        let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        let mut index = [usize::MAX; 5];
        for (slot, field) in Field::ALL.iter().enumerate() {
            let found = lowered.iter().position(|header| {
                field.markers().iter().any(|marker| header.contains(marker))
            });
            match found {
                Some(col) => index[slot] = col,
                None => {
                    return Err(format!(
                        "no column for '{}' among headers {:?}",
                        field.name(),
                        headers
                    ))
                }
            }
        }
        Ok(ColumnIndex(index))
    }
}

/// Resolved column position per field, in `Field::ALL` order
#[derive(Debug, Clone, Copy)]
struct ColumnIndex([usize; 5]);

impl ColumnIndex {
    fn get(&self, field: Field) -> usize {
        let slot = Field::ALL.iter().position(|f| *f == field).unwrap_or(0);
        self.0[slot]
    }
}

/// A row that failed coercion or an invariant, kept for the report
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RejectedRow {
    /// Zero-based data-row index within the results table
    pub row: usize,
    /// Offending column (record field name)
    pub column: String,
    /// Human-readable reason
    pub reason: String,
}

/// Successfully parsed records plus per-row rejections
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Valid records, ascending by (auction_date, tenor), duplicates
    /// collapsed to the last occurrence
    pub records: Vec<AuctionRecord>,
    /// Rows rejected individually
    pub rejected: Vec<RejectedRow>,
    /// Data rows seen in the results table
    pub rows_seen: usize,
}

/// Transforms raw listing markup into validated auction records
#[derive(Debug, Default)]
pub struct AuctionParser {
    headers: HeaderMap,
}

impl AuctionParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a captured listing page.
    ///
    /// A payload without any table is a valid empty result. A payload whose
    /// tables exist but match no declared header set is schema drift. Rows
    /// are independent: one bad row is rejected and reported without
    /// aborting the rest.
    pub fn parse(&self, payload: &RawPayload) -> Result<ParseOutcome> {
        let document = Html::parse_document(&payload.html);
        let table_sel = Selector::parse("table").expect("static selector");
        let row_sel = Selector::parse("tr").expect("static selector");
        let cell_sel = Selector::parse("th, td").expect("static selector");

        let tables: Vec<ElementRef> = document.select(&table_sel).collect();
        if tables.is_empty() {
            debug!("payload contains no tables; treating as empty listing");
            return Ok(ParseOutcome::default());
        }

        let mut drift_reasons = Vec::new();
        for table in &tables {
            let mut rows = table.select(&row_sel);
            let header_row = match rows.next() {
                Some(row) => row,
                None => continue,
            };
            let headers: Vec<String> = header_row
                .select(&cell_sel)
                .map(|cell| cell_text(&cell))
                .collect();

            match self.headers.resolve(&headers) {
                Ok(columns) => {
                    return Ok(self.parse_rows(columns, rows, payload));
                }
                Err(reason) => drift_reasons.push(reason),
            }
        }

        if drift_reasons.is_empty() {
            drift_reasons.push("no table carries a header row".to_string());
        }
        Err(PipelineError::SchemaDrift(drift_reasons.join("; ")))
    }

    fn parse_rows<'a>(
        &self,
        columns: ColumnIndex,
        rows: impl Iterator<Item = ElementRef<'a>>,
        payload: &RawPayload,
    ) -> ParseOutcome {
        let cell_sel = Selector::parse("th, td").expect("static selector");

        // The source is authoritative for its own latest value: duplicate
        // natural keys within one payload collapse to the last occurrence.
        let mut by_key: BTreeMap<NaturalKey, AuctionRecord> = BTreeMap::new();
        let mut rejected = Vec::new();
        let mut rows_seen = 0;

        for (row_idx, row) in rows.enumerate() {
            rows_seen += 1;
            let cells: Vec<String> = row.select(&cell_sel).map(|cell| cell_text(&cell)).collect();

            match self.parse_row(columns, &cells, payload) {
                Ok(record) => {
                    by_key.insert(record.key(), record);
                }
                Err(err) => {
                    warn!(row = row_idx, %err, "rejecting listing row");
                    let column = match &err {
                        PipelineError::ValueParse { column, .. } => column.clone(),
                        _ => "row".to_string(),
                    };
                    rejected.push(RejectedRow {
                        row: row_idx,
                        column,
                        reason: err.to_string(),
                    });
                }
            }
        }

        ParseOutcome {
            records: by_key.into_values().collect(),
            rejected,
            rows_seen,
        }
    }

    fn parse_row(
        &self,
        columns: ColumnIndex,
        cells: &[String],
        payload: &RawPayload,
    ) -> Result<AuctionRecord> {
        let auction_date = parse_date(cell(cells, columns, Field::AuctionDate)?)?;
        let tenor_days = parse_integer(cell(cells, columns, Field::TenorDays)?)?;
        let tenor = Tenor::from_days(tenor_days)?;

        // Yields are published as percentages; the record carries fractions.
        let accepted_yield = parse_decimal(cell(cells, columns, Field::AcceptedYield)?, Field::AcceptedYield)?
            / Decimal::ONE_HUNDRED;
        let price_per_100 = parse_decimal(cell(cells, columns, Field::PricePer100)?, Field::PricePer100)?;
        let total_accepted_amount = parse_decimal(
            cell(cells, columns, Field::TotalAcceptedAmount)?,
            Field::TotalAcceptedAmount,
        )?;

        let record = AuctionRecord {
            auction_date,
            tenor,
            accepted_yield,
            price_per_100,
            total_accepted_amount,
            ingested_at: payload.fetched_at,
        };
        record.validate()?;
        Ok(record)
    }
}

fn cell<'a>(cells: &'a [String], columns: ColumnIndex, field: Field) -> Result<&'a str> {
    cells
        .get(columns.get(field))
        .map(|s| s.as_str())
        .ok_or_else(|| PipelineError::ValueParse {
            column: field.name().to_string(),
            message: "cell missing from row".to_string(),
        })
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Session dates appear as dd/mm/yyyy on the listing; ISO accepted too
fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|e| PipelineError::ValueParse {
            column: Field::AuctionDate.name().to_string(),
            message: format!("'{raw}': {e}"),
        })
}

fn parse_integer(raw: &str) -> Result<i64> {
    raw.trim().parse().map_err(|e| PipelineError::ValueParse {
        column: Field::TenorDays.name().to_string(),
        message: format!("'{raw}': {e}"),
    })
}

fn parse_decimal(raw: &str, field: Field) -> Result<Decimal> {
    let cleaned = raw.trim().replace(',', "").replace('%', "");
    Decimal::from_str(&cleaned).map_err(|e| PipelineError::ValueParse {
        column: field.name().to_string(),
        message: format!("'{raw}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn listing(rows: &[(&str, &str, &str, &str, &str)]) -> RawPayload {
        let mut html = String::from(
            "<html><body><h2>Results</h2><table>\
             <tr><th>Session Date</th><th>Tenor (days)</th>\
             <th>Weighted Avg. Accepted Yield (%)</th><th>Price per 100</th>\
             <th>Total Accepted Amount</th></tr>",
        );
        for (date, tenor, yld, price, amount) in rows {
            html.push_str(&format!(
                "<tr><td>{date}</td><td>{tenor}</td><td>{yld}</td><td>{price}</td><td>{amount}</td></tr>"
            ));
        }
        html.push_str("</table></body></html>");
        RawPayload::new(html)
    }

    #[test]
    fn parses_well_formed_listing() {
        let payload = listing(&[
            ("25/07/2024", "91", "27.5", "93.6", "1,500,000,000"),
            ("25/07/2024", "364", "25.0", "80.06", "25,000,000,000"),
        ]);
        let outcome = AuctionParser::new().parse(&payload).unwrap();

        assert_eq!(outcome.rows_seen, 2);
        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.records.len(), 2);

        let first = &outcome.records[0];
        assert_eq!(first.tenor, Tenor::Days91);
        assert_eq!(first.accepted_yield, dec!(0.275));
        assert_eq!(first.price_per_100, dec!(93.6));
        assert_eq!(first.total_accepted_amount, dec!(1500000000));
        assert_eq!(
            first.auction_date,
            NaiveDate::from_ymd_opt(2024, 7, 25).unwrap()
        );
        for record in &outcome.records {
            assert!(record.validate().is_ok());
        }
    }

    #[test]
    fn column_reordering_still_parses() {
        let payload = RawPayload::new(
            "<table>\
             <tr><th>Price per 100</th><th>Total Accepted Amount</th>\
             <th>Session Date</th><th>Tenor (days)</th><th>Yield (%)</th></tr>\
             <tr><td>93.6</td><td>1000</td><td>25/07/2024</td><td>91</td><td>27.5</td></tr>\
             </table>",
        );
        let outcome = AuctionParser::new().parse(&payload).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].accepted_yield, dec!(0.275));
        assert_eq!(outcome.records[0].price_per_100, dec!(93.6));
    }

    #[test]
    fn missing_expected_column_is_schema_drift() {
        let payload = RawPayload::new(
            "<table>\
             <tr><th>Session Date</th><th>Tenor (days)</th><th>Yield (%)</th></tr>\
             <tr><td>25/07/2024</td><td>91</td><td>27.5</td></tr>\
             </table>",
        );
        let err = AuctionParser::new().parse(&payload).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaDrift(_)), "{err}");
    }

    #[test]
    fn payload_without_tables_is_empty_not_error() {
        let payload = RawPayload::new("<html><body><p>No auctions published.</p></body></html>");
        let outcome = AuctionParser::new().parse(&payload).unwrap();
        assert!(outcome.records.is_empty());
        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.rows_seen, 0);
    }

    #[test]
    fn bad_cell_rejects_only_that_row() {
        let payload = listing(&[
            ("25/07/2024", "91", "not-a-number", "93.6", "1000"),
            ("25/07/2024", "364", "25.0", "80.06", "2000"),
        ]);
        let outcome = AuctionParser::new().parse(&payload).unwrap();

        assert_eq!(outcome.rows_seen, 2);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].tenor, Tenor::Days364);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].row, 0);
        assert_eq!(outcome.rejected[0].column, "accepted_yield");
    }

    #[test]
    fn negative_yield_rejects_only_that_row() {
        let payload = listing(&[
            ("25/07/2024", "91", "-5.0", "93.6", "1000"),
            ("25/07/2024", "182", "26.0", "88.5", "2000"),
        ]);
        let outcome = AuctionParser::new().parse(&payload).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].tenor, Tenor::Days182);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn unknown_tenor_rejects_row() {
        let payload = listing(&[("25/07/2024", "180", "26.0", "88.5", "1000")]);
        let outcome = AuctionParser::new().parse(&payload).unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].column, "tenor");
    }

    #[test]
    fn duplicate_keys_collapse_to_last_occurrence() {
        let payload = listing(&[
            ("25/07/2024", "91", "27.0", "93.5", "1000"),
            ("25/07/2024", "91", "27.5", "93.6", "2000"),
        ]);
        let outcome = AuctionParser::new().parse(&payload).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].accepted_yield, dec!(0.275));
        assert_eq!(outcome.records[0].total_accepted_amount, dec!(2000));
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn records_sorted_ascending_by_date_then_tenor() {
        let payload = listing(&[
            ("01/08/2024", "364", "25.0", "80.0", "1"),
            ("25/07/2024", "182", "26.0", "88.5", "1"),
            ("25/07/2024", "91", "27.5", "93.6", "1"),
        ]);
        let outcome = AuctionParser::new().parse(&payload).unwrap();
        let keys: Vec<_> = outcome.records.iter().map(|r| r.key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(outcome.records[0].tenor, Tenor::Days91);
        assert_eq!(outcome.records[2].tenor, Tenor::Days364);
    }

    #[test]
    fn arabic_headers_resolve() {
        let payload = RawPayload::new(
            "<table>\
             <tr><th>تاريخ الجلسة</th><th>الأجل</th><th>متوسط العائد المرجح</th>\
             <th>السعر لكل 100</th><th>المبالغ المقبولة</th></tr>\
             <tr><td>25/07/2024</td><td>91</td><td>27.5</td><td>93.6</td><td>1000</td></tr>\
             </table>",
        );
        let outcome = AuctionParser::new().parse(&payload).unwrap();
        assert_eq!(outcome.records.len(), 1);
    }
}
