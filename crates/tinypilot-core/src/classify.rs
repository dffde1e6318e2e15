//! Query classification shared by the retriever and the generator.
//!
//! Both components route on [`classify`] so they can never disagree about
//! whether a question is about bounties.

use once_cell::sync::Lazy;
use regex::Regex;

static DOLLAR_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap());

/// Routing decision for a free-text query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// The query mentions bounties; search only bounty records.
    Bounty,
    /// Anything else; search tutorials and code/bounty records separately.
    General,
}

/// Classify a query by keyword.
///
/// A query is a bounty query iff its lowercase form contains `"bounty"` or
/// `"bounties"`. Pure function of the input text.
pub fn classify(query: &str) -> QueryKind {
    let lower = query.to_lowercase();
    if lower.contains("bounty") || lower.contains("bounties") {
        QueryKind::Bounty
    } else {
        QueryKind::General
    }
}

/// Extract the first literal dollar amount from a query, formatted as `"$<digits>"`.
///
/// Only a `$` immediately followed by ASCII digits counts. Thousands
/// separators are dropped and a decimal part is kept, matching how bounty
/// values are normalized at index time: `"$1,000"` yields `"$1000"`.
/// A trailing `.` or `,` is punctuation, not part of the amount.
pub fn dollar_amount(query: &str) -> Option<String> {
    DOLLAR_AMOUNT
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| format!("${}", m.as_str().replace(',', "")))
}
