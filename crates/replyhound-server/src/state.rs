//! Wiring of stores, model and transports into the shared [`AppState`].

use std::sync::Arc;
use std::time::Duration;

use replyhound_core::{
    AppConfig, BucketStore, LeadModel, LeadStore, Messenger, ReplyPoster, ScanTokens, SeenStore,
};
use replyhound_db::PgStore;
use replyhound_pipeline::memory::{MemoryBucketStore, MemoryLeadStore, MemorySeenStore};
use replyhound_pipeline::{
    Dispatcher, InMemorySessionStore, Ledger, Pipeline, PipelineSettings, RateLimiter, Wizard,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub dispatcher: Arc<Dispatcher>,
    pub wizard: Arc<Wizard>,
    pub limiter: RateLimiter,
    pub tokens: ScanTokens,
    pub store: Arc<dyn LeadStore>,
    /// `None` when running on the in-memory stores.
    pub pool: Option<PgPool>,
    /// Chat that receives poller notifications and may use admin commands.
    pub operator_chat: Option<String>,
    pub public_base_url: Option<String>,
}

/// The three storage ports, backed by one implementation.
pub struct Backends {
    pub seen: Arc<dyn SeenStore>,
    pub buckets: Arc<dyn BucketStore>,
    pub leads: Arc<dyn LeadStore>,
    pub pool: Option<PgPool>,
}

impl Backends {
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        Self {
            seen: store.clone(),
            buckets: store.clone(),
            leads: store,
            pool: Some(pool),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            seen: Arc::new(MemorySeenStore::new()),
            buckets: Arc::new(MemoryBucketStore::new()),
            leads: Arc::new(MemoryLeadStore::new()),
            pool: None,
        }
    }
}

/// Collaborators that talk to the outside world.
pub struct Transports {
    pub model: Arc<dyn LeadModel>,
    pub messenger: Arc<dyn Messenger>,
    pub poster: Option<Arc<dyn ReplyPoster>>,
}

#[must_use]
pub fn build_state(config: &AppConfig, backends: Backends, transports: Transports) -> AppState {
    let ledger = Ledger::new(backends.seen, config.self_echo_min_matches);

    let mut dispatcher = Dispatcher::new(
        transports.messenger,
        Arc::clone(&backends.leads),
        ledger.clone(),
        Duration::from_secs(config.direct_post_ttl_secs),
    );
    if let Some(poster) = transports.poster {
        dispatcher = dispatcher.with_poster(poster);
    }
    let dispatcher = Arc::new(dispatcher);

    let pipeline = Pipeline::new(
        ledger,
        Arc::clone(&backends.leads),
        transports.model,
        PipelineSettings::from_app_config(config),
    )
    .with_dispatcher(Arc::clone(&dispatcher));

    let wizard = Wizard::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::clone(&backends.leads),
        Duration::from_secs(config.wizard_ttl_secs),
    );

    AppState {
        pipeline: Arc::new(pipeline),
        dispatcher,
        wizard: Arc::new(wizard),
        limiter: RateLimiter::from_app_config(backends.buckets, config),
        tokens: ScanTokens::from_app_config(config),
        store: backends.leads,
        pool: backends.pool,
        operator_chat: config.telegram_chat_id.clone(),
        public_base_url: config.public_base_url.clone(),
    }
}
