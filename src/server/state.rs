use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::announcer::{AnnouncementPublisher, BroadcastSink};
use crate::auth::JwtValidator;
use crate::config::Settings;
use crate::postgres::PostgresPool;
use crate::queue::{
    CallDispatcher, QueueLifecycleController, QueueState, QueueStats, SkipHandler, SnapshotCache,
};
use crate::store::QueueStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Option<Arc<JwtValidator>>,
    pub controller: Arc<QueueLifecycleController>,
    pub dispatcher: Arc<CallDispatcher>,
    pub skip_handler: Arc<SkipHandler>,
    pub active_cache: Arc<SnapshotCache<Vec<QueueState>>>,
    pub stats_cache: Arc<SnapshotCache<QueueStats>>,
    pub broadcast: BroadcastSink,
    pub postgres_pool: Option<PostgresPool>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the queue components around `store`.
    ///
    /// `publisher` must already be delivering to `broadcast` for the SSE
    /// stream to see call-next announcements.
    pub fn new(
        settings: Settings,
        store: Arc<dyn QueueStore>,
        publisher: AnnouncementPublisher,
        broadcast: BroadcastSink,
        postgres_pool: Option<PostgresPool>,
    ) -> Self {
        let jwt_validator = JwtValidator::from_config(&settings.auth).map(Arc::new);
        if jwt_validator.is_none() {
            tracing::warn!("No auth.jwt_secret configured, queue API is open");
        }

        let controller = Arc::new(QueueLifecycleController::new(store));
        let dispatcher = Arc::new(CallDispatcher::new(controller.clone(), publisher));
        let skip_handler = Arc::new(SkipHandler::new(controller.clone()));

        let active_cache = Arc::new(SnapshotCache::new(Duration::from_secs(
            settings.cache.active_ttl_seconds,
        )));
        let stats_cache = Arc::new(SnapshotCache::new(Duration::from_secs(
            settings.cache.statistics_ttl_seconds,
        )));

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            controller,
            dispatcher,
            skip_handler,
            active_cache,
            stats_cache,
            broadcast,
            postgres_pool,
            start_time: Instant::now(),
        }
    }
}
