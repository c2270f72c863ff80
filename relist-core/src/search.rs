use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query against the candidate search engine. The engine is a black box
/// to this core: it returns text-similar products with price and store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Normalized product name to match against.
    pub name: String,
    /// Restrict results to this brand when set.
    pub brand: Option<String>,
    pub limit: usize,
}

/// One raw hit from the search engine, before scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    pub price_cents: i64,
    /// Raw text similarity in [0, 1] as reported by the engine.
    pub similarity: f64,
}
