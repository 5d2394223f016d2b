//! Narrative denoising and product filtering applied before ingestion.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::Record;

/// Products kept by default when preparing the corpus.
pub const DEFAULT_PRODUCTS: &[&str] = &[
    "Credit card",
    "Personal loan",
    "Buy Now, Pay Later (BNPL)",
    "Savings account",
    "Money transfers",
];

// Openings that carry no signal; everything from the match to the end goes.
static BOILERPLATE: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)i am writing to file a complaint[\s\S]*").expect("literal pattern"),
        Regex::new(r"(?i)dear (?:sir|madam|to whom it may concern)[\s\S]*")
            .expect("literal pattern"),
    ]
});

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s]").expect("literal pattern"));

/// Normalize a narrative for embedding.
///
/// Lower-cases, drops boilerplate openings, replaces anything outside
/// `[a-z0-9]` and whitespace with a space, collapses whitespace runs, trims.
pub fn clean_text(text: &str) -> String {
    let mut cleaned = text.to_lowercase();
    for pattern in BOILERPLATE.iter() {
        cleaned = pattern.replace_all(&cleaned, " ").into_owned();
    }
    cleaned = NON_ALPHANUMERIC.replace_all(&cleaned, " ").into_owned();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep only records whose product is in `allowed`.
pub fn retain_products(records: Vec<Record>, allowed: &[&str]) -> Vec<Record> {
    records.into_iter().filter(|record| allowed.contains(&record.product.as_str())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_collapses_spaces() {
        assert_eq!(
            clean_text("  My  CARD was charged $35!!\n\nTwice. "),
            "my card was charged 35 twice"
        );
    }

    #[test]
    fn removes_boilerplate_through_end_of_text() {
        assert_eq!(
            clean_text("Fee of $20. I am writing to file a complaint about my bank."),
            "fee of 20"
        );
        assert_eq!(clean_text("Dear Sir, please help"), "");
    }

    #[test]
    fn filters_by_product() {
        let records = vec![
            Record::new("1", "Credit card", "a"),
            Record::new("2", "Mortgage", "b"),
            Record::new("3", "Money transfers", "c"),
        ];
        let kept = retain_products(records, DEFAULT_PRODUCTS);
        let ids: Vec<&str> = kept.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }
}
