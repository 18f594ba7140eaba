//! Common test utilities and fixtures

use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;

use tbill_tracker::common::types::{AuctionRecord, Tenor};

/// Create a sample auction record for testing
pub fn sample_record(date: NaiveDate, tenor: Tenor) -> AuctionRecord {
    AuctionRecord {
        auction_date: date,
        tenor,
        accepted_yield: dec!(0.275),
        price_per_100: dec!(93.55),
        total_accepted_amount: dec!(1_500_000_000),
        ingested_at: Utc::now(),
    }
}

/// A full auction session: one record per tenor on the same date
pub fn sample_session(date: NaiveDate) -> Vec<AuctionRecord> {
    Tenor::ALL.iter().map(|t| sample_record(date, *t)).collect()
}

/// Render rows into a listing page shaped like the source's results table
pub fn listing_html(rows: &[(&str, &str, &str, &str, &str)]) -> String {
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
    html
}

/// A listing whose table headers no longer match the declared mapping
pub fn drifted_listing_html() -> String {
    "<html><body><table>\
     <tr><th>Date</th><th>Duration</th><th>Rate</th></tr>\
     <tr><td>25/07/2024</td><td>91</td><td>27.5</td></tr>\
     </table></body></html>"
        .to_string()
}
