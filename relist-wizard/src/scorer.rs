use relist_core::models::{Candidate, ExpiredItem};
use relist_core::search::SearchHit;
use std::cmp::Ordering;
use uuid::Uuid;

use crate::search::brands_match;

const SIMILARITY_WEIGHT: f64 = 0.6;
const BRAND_WEIGHT: f64 = 0.25;
const PRICE_WEIGHT: f64 = 0.15;

/// Deterministic candidate ranking.
///
/// `total_score` combines normalized text similarity, a brand-match bonus
/// and price proximity to the original item, clamped to [0, 1]. The tie
/// break order is part of the contract: score desc, then price asc, then
/// candidate id asc. Re-running over the same input never changes order.
pub struct Scorer {
    max_candidates: usize,
}

impl Scorer {
    pub fn new(max_candidates: usize) -> Self {
        Self { max_candidates }
    }

    /// Score raw hits, rank them, and keep the top N.
    pub fn score_hits(&self, item: &ExpiredItem, hits: Vec<SearchHit>) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = hits
            .into_iter()
            .map(|hit| {
                let brand_match = brands_match(&item.brand, &hit.brand);
                let total_score = score(hit.similarity, brand_match, item.price_cents, hit.price_cents);
                Candidate {
                    candidate_id: Uuid::new_v4(),
                    product_id: hit.product_id,
                    store_id: hit.store_id,
                    name: hit.name,
                    brand: hit.brand,
                    price_cents: hit.price_cents,
                    brand_match,
                    similarity: hit.similarity,
                    total_score,
                    explanation: String::new(),
                }
            })
            .collect();

        rank(&mut candidates);
        candidates.truncate(self.max_candidates);
        candidates
    }
}

/// Strict ordering: total_score desc, price asc, candidate_id asc.
/// `total_cmp` so NaN cannot scramble the order.
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        match b.total_score.total_cmp(&a.total_score) {
            Ordering::Equal => {}
            other => return other,
        }
        match a.price_cents.cmp(&b.price_cents) {
            Ordering::Equal => {}
            other => return other,
        }
        a.candidate_id.cmp(&b.candidate_id)
    });
}

fn score(similarity: f64, brand_match: bool, original_price: i64, candidate_price: i64) -> f64 {
    let similarity = similarity.clamp(0.0, 1.0);
    let brand_bonus = if brand_match { 1.0 } else { 0.0 };
    let total = SIMILARITY_WEIGHT * similarity
        + BRAND_WEIGHT * brand_bonus
        + PRICE_WEIGHT * price_proximity(original_price, candidate_price);
    total.clamp(0.0, 1.0)
}

/// 1.0 at identical price, falling linearly to 0.0 at a 100% deviation.
fn price_proximity(original: i64, candidate: i64) -> f64 {
    if original <= 0 {
        return 0.0;
    }
    let delta = (candidate - original).abs() as f64 / original as f64;
    1.0 - delta.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u128, score: f64, price: i64) -> Candidate {
        Candidate {
            candidate_id: Uuid::from_u128(id),
            product_id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            name: "x".to_string(),
            brand: None,
            price_cents: price,
            brand_match: false,
            similarity: 0.0,
            total_score: score,
            explanation: String::new(),
        }
    }

    fn item(price: i64, brand: Option<&str>) -> ExpiredItem {
        ExpiredItem {
            item_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: "pasta".to_string(),
            brand: brand.map(|b| b.to_string()),
            store_id: Uuid::new_v4(),
            price_cents: price,
        }
    }

    #[test]
    fn test_rank_order_score_then_price_then_id() {
        let mut candidates = vec![
            candidate(3, 0.5, 100),
            candidate(1, 0.5, 50),
            candidate(2, 0.9, 300),
            candidate(5, 0.5, 50),
            candidate(4, 0.5, 50),
        ];
        rank(&mut candidates);
        let ids: Vec<u128> = candidates
            .iter()
            .map(|c| c.candidate_id.as_u128())
            .collect();
        // 0.9 first; among the 0.5s price 50 beats 100; equal price by id.
        assert_eq!(ids, vec![2, 1, 4, 5, 3]);
    }

    #[test]
    fn test_rank_is_deterministic() {
        let mut a = vec![
            candidate(9, 0.4, 70),
            candidate(2, 0.4, 70),
            candidate(7, 0.8, 10),
        ];
        let mut b = a.clone();
        rank(&mut a);
        rank(&mut b);
        let ids = |v: &[Candidate]| v.iter().map(|c| c.candidate_id).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_brand_match_outranks_similar_stranger() {
        let scorer = Scorer::new(5);
        let item = item(200, Some("Barilla"));
        let same_brand = SearchHit {
            product_id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            name: "penne 500g".to_string(),
            brand: Some("Barilla".to_string()),
            price_cents: 200,
            similarity: 0.7,
        };
        let other_brand = SearchHit {
            brand: Some("DeCecco".to_string()),
            similarity: 0.8,
            ..same_brand.clone()
        };
        let ranked = scorer.score_hits(&item, vec![other_brand, same_brand]);
        assert!(ranked[0].brand_match);
        assert!(ranked[0].total_score > ranked[1].total_score);
    }

    #[test]
    fn test_scores_stay_in_unit_range() {
        assert_eq!(score(2.0, true, 100, 100), 1.0);
        assert_eq!(score(-1.0, false, 100, 100_000), 0.0);
        let mid = score(0.5, false, 100, 150);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_price_proximity() {
        assert_eq!(price_proximity(100, 100), 1.0);
        assert_eq!(price_proximity(100, 200), 0.0);
        assert_eq!(price_proximity(100, 150), 0.5);
        assert_eq!(price_proximity(0, 100), 0.0);
    }

    #[test]
    fn test_truncates_to_max_candidates() {
        let scorer = Scorer::new(2);
        let item = item(100, None);
        let hits: Vec<SearchHit> = (0..6)
            .map(|i| SearchHit {
                product_id: Uuid::new_v4(),
                store_id: Uuid::new_v4(),
                name: format!("p{i}"),
                brand: None,
                price_cents: 100 + i,
                similarity: 0.5,
            })
            .collect();
        assert_eq!(scorer.score_hits(&item, hits).len(), 2);
    }
}
