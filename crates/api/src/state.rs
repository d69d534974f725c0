use std::sync::Arc;

use thumbforge_core::entitlement::{AdminEmails, EntitlementLedger};
use thumbforge_core::history::ThumbnailHistory;
use thumbforge_core::orchestrator::GenerationOrchestrator;
use thumbforge_core::provider::ImageGenerator;
use thumbforge_core::references::ReferenceCollector;
use thumbforge_core::regenerate::RegenerateSessions;
use thumbforge_core::scratch::ScratchSpace;
use thumbforge_core::store::{EntitlementStore, ResultStore, SessionStore};

use crate::config::ServerConfig;

/// The three persistence backends the core needs.
pub struct Stores {
    pub entitlements: Arc<dyn EntitlementStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub results: Arc<dyn ResultStore>,
}

/// External generation capabilities.
pub struct Providers {
    pub generator: Arc<dyn ImageGenerator>,
    /// `None` disables reference collection.
    pub references: Option<Arc<ReferenceCollector>>,
}

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// `None` when running over in-memory stores.
    pub pool: Option<thumbforge_db::DbPool>,
    pub config: Arc<ServerConfig>,
    pub ledger: Arc<EntitlementLedger>,
    pub sessions: Arc<RegenerateSessions>,
    pub history: Arc<ThumbnailHistory>,
    pub orchestrator: Arc<GenerationOrchestrator>,
}

impl AppState {
    /// Wire the core services over the given stores and providers.
    pub fn new(
        config: ServerConfig,
        pool: Option<thumbforge_db::DbPool>,
        stores: Stores,
        providers: Providers,
    ) -> Self {
        let policy = Arc::new(AdminEmails::new(&config.admin_emails));
        let ledger = Arc::new(EntitlementLedger::new(
            stores.entitlements,
            stores.results.clone(),
            policy,
        ));
        let sessions = Arc::new(RegenerateSessions::new(stores.sessions));
        let history = Arc::new(ThumbnailHistory::new(stores.results.clone()));

        let mut orchestrator = GenerationOrchestrator::new(
            ledger.clone(),
            stores.results,
            sessions.clone(),
            providers.generator,
            ScratchSpace::new(config.scratch_dir.clone()),
            config.generation.orchestrator_settings(),
        );
        if let Some(collector) = providers.references {
            orchestrator = orchestrator.with_references(collector);
        }

        Self {
            pool,
            config: Arc::new(config),
            ledger,
            sessions,
            history,
            orchestrator: Arc::new(orchestrator),
        }
    }
}
