use std::sync::Arc;

use crate::handlers::dispatch::Orchestrator;
use crate::routing::BotIdentity;
use crate::session::SessionStore;

/// Shared handles injected into every update handler.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<BotIdentity>,
    pub sessions: Arc<dyn SessionStore>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(
        identity: BotIdentity,
        sessions: Arc<dyn SessionStore>,
        orchestrator: Orchestrator,
    ) -> Self {
        AppState {
            identity: Arc::new(identity),
            sessions,
            orchestrator: Arc::new(orchestrator),
        }
    }
}
