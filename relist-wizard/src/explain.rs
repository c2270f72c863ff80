use relist_core::models::{Candidate, ExpiredItem};

/// Turns a scored candidate into the human-readable justification shown
/// next to it in the wizard. Output is deterministic for a given pair.
pub struct ExplanationBuilder;

impl ExplanationBuilder {
    pub fn build(item: &ExpiredItem, candidate: &Candidate) -> String {
        let brand_part = match (&candidate.brand, candidate.brand_match) {
            (Some(brand), true) => format!("Same brand ({brand})"),
            (Some(brand), false) => format!("Different brand ({brand})"),
            (None, _) => "Unbranded".to_string(),
        };

        let match_part = format!("{}% name match", (candidate.similarity * 100.0).round() as i64);

        let delta = candidate.price_cents - item.price_cents;
        let price_part = if delta == 0 {
            "same price".to_string()
        } else if delta < 0 {
            format!("{} cheaper", format_cents(-delta))
        } else {
            format!("{} more expensive", format_cents(delta))
        };

        format!("{brand_part}, {match_part}, {price_part}")
    }
}

fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}
