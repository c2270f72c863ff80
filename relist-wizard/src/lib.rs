pub mod confirm;
pub mod detector;
pub mod explain;
pub mod orchestrator;
pub mod scorer;
pub mod search;
pub mod store_selector;

pub use confirm::ConfirmationEngine;
pub use detector::ExpiredItemDetector;
pub use explain::ExplanationBuilder;
pub use orchestrator::WizardOrchestrator;
pub use scorer::Scorer;
pub use search::CandidateSearch;
pub use store_selector::StoreSelector;

/// Tunable wizard parameters, loaded from configuration by the caller.
#[derive(Debug, Clone)]
pub struct WizardRules {
    /// Candidates kept per expired item after scoring.
    pub max_candidates: usize,
    /// Minimum brand-pass hits before the name-only fallback is skipped.
    pub min_brand_results: usize,
    /// Maximum stores the selector may pick.
    pub max_stores: usize,
}

impl Default for WizardRules {
    fn default() -> Self {
        Self {
            max_candidates: 5,
            min_brand_results: 2,
            max_stores: 2,
        }
    }
}
