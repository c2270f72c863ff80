use relist_core::models::ExpiredItem;
use relist_core::repository::SearchEngine;
use relist_core::search::{SearchHit, SearchQuery};
use relist_core::WizardResult;
use std::sync::Arc;

/// Two-pass candidate search for one expired item.
///
/// Pass 1 restricts to the original brand: same-brand substitution is the
/// higher-confidence replacement and must be preferred when the current
/// cycle still carries the brand. Pass 2 drops the brand restriction so an
/// item whose brand vanished entirely still gets candidates.
pub struct CandidateSearch {
    engine: Arc<dyn SearchEngine>,
    min_brand_results: usize,
    fetch_limit: usize,
}

impl CandidateSearch {
    pub fn new(engine: Arc<dyn SearchEngine>, min_brand_results: usize, fetch_limit: usize) -> Self {
        Self {
            engine,
            min_brand_results,
            fetch_limit,
        }
    }

    pub async fn candidates_for(&self, item: &ExpiredItem) -> WizardResult<Vec<SearchHit>> {
        let name = normalize_name(&item.name);

        if let Some(brand) = &item.brand {
            let branded = self
                .engine
                .find_similar(&SearchQuery {
                    name: name.clone(),
                    brand: Some(brand.clone()),
                    limit: self.fetch_limit,
                })
                .await?;

            if branded.len() >= self.min_brand_results {
                tracing::debug!(
                    item_id = %item.item_id,
                    hits = branded.len(),
                    "Brand pass satisfied"
                );
                return Ok(branded);
            }
        }

        let hits = self
            .engine
            .find_similar(&SearchQuery {
                name,
                brand: None,
                limit: self.fetch_limit,
            })
            .await?;
        tracing::debug!(item_id = %item.item_id, hits = hits.len(), "Name-only fallback");
        Ok(hits)
    }
}

/// Lowercase, strip punctuation, collapse whitespace. The search engine
/// receives this form so "Coca-Cola  1,5L" and "coca cola 1 5l" match.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = true;
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Case-insensitive brand equality for the brand_match flag.
pub fn brands_match(original: &Option<String>, candidate: &Option<String>) -> bool {
    match (original, candidate) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}
