use relist_wizard::{ConfirmationEngine, WizardOrchestrator};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthSettings {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<WizardOrchestrator>,
    pub confirmation: Arc<ConfirmationEngine>,
    pub auth: AuthSettings,
}
