use relist_core::models::{StoreAllocation, SuggestionSet};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Chooses up to K stores covering the most items at the best aggregate
/// score.
///
/// Greedy set-cover heuristic, not an optimal solve: repeatedly pick the
/// store that newly covers the most still-uncovered items, ties broken by
/// higher mean best-candidate score, then by store id ascending. The tie
/// break order is fixed for reproducibility.
pub struct StoreSelector {
    max_stores: usize,
}

impl StoreSelector {
    pub fn new(max_stores: usize) -> Self {
        Self { max_stores }
    }

    /// Picks the stores and pins each item's recommended candidate to the
    /// best ranked one available in a selected store.
    pub fn select(&self, sets: &mut [SuggestionSet]) -> Vec<StoreAllocation> {
        let mut uncovered: BTreeSet<Uuid> = sets
            .iter()
            .filter(|s| !s.candidates.is_empty())
            .map(|s| s.item.item_id)
            .collect();

        let mut selected: Vec<Uuid> = Vec::new();

        while selected.len() < self.max_stores && !uncovered.is_empty() {
            // store -> (newly covered items, sum of best scores there)
            let mut stats: BTreeMap<Uuid, (usize, f64)> = BTreeMap::new();
            for set in sets.iter() {
                if !uncovered.contains(&set.item.item_id) {
                    continue;
                }
                let mut best_per_store: BTreeMap<Uuid, f64> = BTreeMap::new();
                for candidate in &set.candidates {
                    let entry = best_per_store.entry(candidate.store_id).or_insert(f64::MIN);
                    if candidate.total_score > *entry {
                        *entry = candidate.total_score;
                    }
                }
                for (store_id, score) in best_per_store {
                    let entry = stats.entry(store_id).or_insert((0, 0.0));
                    entry.0 += 1;
                    entry.1 += score;
                }
            }

            // BTreeMap iterates store ids ascending, so strict "better
            // than" comparisons make the lowest id win ties.
            let mut winner: Option<(Uuid, usize, f64)> = None;
            for (store_id, (count, score_sum)) in stats {
                let mean = score_sum / count as f64;
                let better = match winner {
                    None => true,
                    Some((_, best_count, best_mean)) => {
                        count > best_count || (count == best_count && mean > best_mean)
                    }
                };
                if better {
                    winner = Some((store_id, count, mean));
                }
            }

            let Some((store_id, _, _)) = winner else { break };
            selected.push(store_id);
            for set in sets.iter() {
                if set.candidates.iter().any(|c| c.store_id == store_id) {
                    uncovered.remove(&set.item.item_id);
                }
            }
        }

        selected.sort();

        // Pin each item to its best candidate within the selected stores.
        let mut allocations: BTreeMap<Uuid, Vec<Uuid>> =
            selected.iter().map(|s| (*s, Vec::new())).collect();
        for set in sets.iter_mut() {
            // Candidates are already rank-ordered; the first hit wins.
            let recommended = set
                .candidates
                .iter()
                .find(|c| allocations.contains_key(&c.store_id));
            set.recommended_candidate_id = recommended.map(|c| c.candidate_id);
            if let Some(c) = recommended {
                if let Some(items) = allocations.get_mut(&c.store_id) {
                    items.push(set.item.item_id);
                }
            }
        }

        allocations
            .into_iter()
            .map(|(store_id, item_ids)| StoreAllocation { store_id, item_ids })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relist_core::models::{Candidate, ExpiredItem};

    fn set(item_id: u128, candidates: Vec<Candidate>) -> SuggestionSet {
        SuggestionSet {
            item: ExpiredItem {
                item_id: Uuid::from_u128(item_id),
                product_id: Uuid::new_v4(),
                name: format!("item {item_id}"),
                brand: None,
                store_id: Uuid::new_v4(),
                price_cents: 100,
            },
            candidates,
            recommended_candidate_id: None,
        }
    }

    fn candidate(id: u128, store: u128, score: f64) -> Candidate {
        Candidate {
            candidate_id: Uuid::from_u128(id),
            product_id: Uuid::new_v4(),
            store_id: Uuid::from_u128(store),
            name: "c".to_string(),
            brand: None,
            price_cents: 100,
            brand_match: false,
            similarity: score,
            total_score: score,
            explanation: String::new(),
        }
    }

    #[test]
    fn test_two_stores_cover_three_items() {
        // Items 1 and 2 resolvable at store 10; item 3 only at store 20.
        let mut sets = vec![
            set(1, vec![candidate(101, 10, 0.9), candidate(102, 30, 0.5)]),
            set(2, vec![candidate(201, 10, 0.8)]),
            set(3, vec![candidate(301, 20, 0.7)]),
        ];
        let allocations = StoreSelector::new(2).select(&mut sets);

        assert_eq!(allocations.len(), 2);
        let stores: Vec<Uuid> = allocations.iter().map(|a| a.store_id).collect();
        assert_eq!(stores, vec![Uuid::from_u128(10), Uuid::from_u128(20)]);
        assert!(sets.iter().all(|s| s.recommended_candidate_id.is_some()));
        assert_eq!(
            sets[0].recommended_candidate_id,
            Some(Uuid::from_u128(101))
        );
    }

    #[test]
    fn test_tie_broken_by_mean_score_then_store_id() {
        // Both stores cover the single item; store 20 scores higher.
        let mut sets = vec![set(
            1,
            vec![candidate(101, 10, 0.4), candidate(102, 20, 0.9)],
        )];
        let allocations = StoreSelector::new(1).select(&mut sets);
        assert_eq!(allocations[0].store_id, Uuid::from_u128(20));

        // Identical coverage and score: lowest store id wins.
        let mut sets = vec![set(
            1,
            vec![candidate(101, 30, 0.5), candidate(102, 20, 0.5)],
        )];
        let allocations = StoreSelector::new(1).select(&mut sets);
        assert_eq!(allocations[0].store_id, Uuid::from_u128(20));
    }

    #[test]
    fn test_k_limit_leaves_items_unrecommended() {
        let mut sets = vec![
            set(1, vec![candidate(101, 10, 0.9)]),
            set(2, vec![candidate(201, 20, 0.8)]),
        ];
        let allocations = StoreSelector::new(1).select(&mut sets);
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].store_id, Uuid::from_u128(10));
        assert!(sets[0].recommended_candidate_id.is_some());
        assert!(sets[1].recommended_candidate_id.is_none());
    }

    #[test]
    fn test_items_without_candidates_are_ignored() {
        let mut sets = vec![set(1, vec![]), set(2, vec![candidate(201, 10, 0.5)])];
        let allocations = StoreSelector::new(2).select(&mut sets);
        assert_eq!(allocations.len(), 1);
        assert!(sets[0].recommended_candidate_id.is_none());
    }
}
