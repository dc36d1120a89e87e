use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::discovery::{ContextDiscovery, DiscoveredApp, DiscoveryOutcome};
use super::endpoints::{Endpoints, InventoryEndpoint};
use super::error::InventoryError;
use super::gate::CompletionGate;
use super::model::{AggregateInventory, AppContextPair, Inventory};
use super::paginate::PaginatingFetcher;
use super::store::AggregateStore;
use super::transport::{CommunityClient, RetryPolicy, RetryingTransport, WebFetch};
use crate::config::InventoryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Discovering,
    FetchingAll,
    Ready,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    /// Discovery found and decoded the app/context table.
    pub success: bool,
    /// The profile page had no app/context table.
    pub is_private: bool,
    pub discovered: usize,
    pub stored: usize,
    /// Fetched, but the pair was already held by an earlier writer.
    pub already_present: usize,
    pub failed: usize,
}

/// Entry point: discovers a user's inventories and fetches them all concurrently.
pub struct InventoryFetcher {
    discovery: ContextDiscovery,
    pages: PaginatingFetcher,
    max_concurrency: usize,
}

impl InventoryFetcher {
    pub fn new(web: Arc<dyn WebFetch>, config: &InventoryConfig) -> Result<Self, InventoryError> {
        let endpoints = Endpoints::new(&config.community_base)?;
        let transport = RetryingTransport::new(web, RetryPolicy::from_config(config));
        Ok(Self {
            discovery: ContextDiscovery::new(transport.clone(), endpoints.clone()),
            pages: PaginatingFetcher::new(transport, endpoints, config.max_pages),
            max_concurrency: config.max_concurrency.max(1),
        })
    }

    /// Build over the `reqwest` community client.
    pub fn from_config(config: &InventoryConfig) -> anyhow::Result<Self> {
        let client = CommunityClient::new(config)?;
        Ok(Self::new(Arc::new(client), config)?)
    }

    /// Start a run in the background and return its handle right away.
    /// `app_filter` restricts the run to the listed app ids.
    ///
    /// Must be called from within a tokio runtime.
    pub fn fetch_inventories(&self, user_id: u64, app_filter: Option<Vec<u32>>) -> FetchRun {
        let shared = Arc::new(RunShared::new(user_id, self.pages.clone()));
        let span = info_span!("inventory_run", run_id = %shared.run_id, user_id);
        tokio::spawn(
            drive(
                shared.clone(),
                self.discovery.clone(),
                app_filter,
                self.max_concurrency,
            )
            .instrument(span),
        );
        FetchRun { shared }
    }
}

struct RunShared {
    run_id: Uuid,
    user_id: u64,
    state: watch::Sender<RunState>,
    store: AggregateStore,
    gate: CompletionGate,
    outcome: OnceLock<RunOutcome>,
    apps: OnceLock<Vec<DiscoveredApp>>,
    pages: PaginatingFetcher,
}

impl RunShared {
    fn new(user_id: u64, pages: PaginatingFetcher) -> Self {
        let (state, _) = watch::channel(RunState::Discovering);
        Self {
            run_id: Uuid::new_v4(),
            user_id,
            state,
            store: AggregateStore::new(),
            gate: CompletionGate::new(),
            outcome: OnceLock::new(),
            apps: OnceLock::new(),
            pages,
        }
    }

    fn finish(&self, outcome: RunOutcome) {
        let summary = outcome.clone();
        if self.outcome.set(outcome).is_err() {
            return;
        }
        self.state.send_replace(RunState::Ready);
        if self.gate.fire() {
            info!(
                success = summary.success,
                is_private = summary.is_private,
                discovered = summary.discovered,
                stored = summary.stored,
                already_present = summary.already_present,
                failed = summary.failed,
                "inventories loaded"
            );
        }
    }
}

/// Releases readers even if the driver is dropped or panics midway.
struct FinishOnDrop(Arc<RunShared>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        if !self.0.gate.is_fired() {
            warn!("inventory run ended abnormally");
            self.0.finish(RunOutcome::default());
        }
    }
}

async fn drive(
    shared: Arc<RunShared>,
    discovery: ContextDiscovery,
    app_filter: Option<Vec<u32>>,
    max_concurrency: usize,
) {
    let _finish = FinishOnDrop(shared.clone());

    let discovered = discovery
        .discover(shared.user_id, app_filter.as_deref())
        .await;
    let pairs = discovered.pairs();
    match discovered {
        DiscoveryOutcome::Private => {
            shared.finish(RunOutcome {
                is_private: true,
                ..RunOutcome::default()
            });
            return;
        }
        DiscoveryOutcome::Malformed => {
            shared.finish(RunOutcome::default());
            return;
        }
        DiscoveryOutcome::Found(apps) => {
            let _ = shared.apps.set(apps);
        }
    }

    shared.state.send_replace(RunState::FetchingAll);
    let limiter = Arc::new(Semaphore::new(max_concurrency));
    let mut tasks = JoinSet::new();
    for pair in pairs.iter().copied() {
        let shared = shared.clone();
        let limiter = limiter.clone();
        tasks.spawn(
            async move {
                let _permit = limiter.acquire_owned().await.ok();
                let inventory = shared
                    .pages
                    .fetch(&InventoryEndpoint::Profile, shared.user_id, pair)
                    .await?;
                let inserted = shared.store.insert(pair, inventory).await;
                if !inserted {
                    debug!(%pair, "inventory already present; keeping the first one");
                }
                Some(inserted)
            }
            .in_current_span(),
        );
    }

    let (mut stored, mut already_present, mut failed) = (0usize, 0usize, 0usize);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(true)) => stored += 1,
            Ok(Some(false)) => already_present += 1,
            Ok(None) => failed += 1,
            Err(e) => {
                error!(error = %e, "inventory fetch task failed");
                failed += 1;
            }
        }
    }

    shared.finish(RunOutcome {
        success: true,
        is_private: false,
        discovered: pairs.len(),
        stored,
        already_present,
        failed,
    });
}

/// Handle to one user's fetch. Cheap to clone; every reader waits for the run
/// to reach [`RunState::Ready`] before it sees the aggregate.
#[derive(Clone)]
pub struct FetchRun {
    shared: Arc<RunShared>,
}

impl FetchRun {
    pub fn run_id(&self) -> Uuid {
        self.shared.run_id
    }

    pub fn user_id(&self) -> u64 {
        self.shared.user_id
    }

    pub fn state(&self) -> RunState {
        *self.shared.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.gate.is_fired()
    }

    pub async fn wait(&self) {
        self.shared.gate.wait().await;
    }

    /// Run `hook` once the run is ready (immediately if it already is).
    pub fn on_ready(&self, hook: impl FnOnce() + Send + 'static) {
        self.shared.gate.on_fire(hook);
    }

    pub async fn get_aggregate(&self) -> AggregateInventory {
        self.wait().await;
        self.shared.store.snapshot().await
    }

    pub async fn get_inventory(
        &self,
        app_id: u32,
        context_id: u64,
    ) -> Result<Arc<Inventory>, InventoryError> {
        self.wait().await;
        self.shared
            .store
            .get(AppContextPair::new(app_id, context_id))
            .await
            .ok_or(InventoryError::NotFound { app_id, context_id })
    }

    pub async fn outcome(&self) -> RunOutcome {
        self.wait().await;
        self.shared.outcome.get().cloned().unwrap_or_default()
    }

    /// Apps listed on the profile page (after the allow-list).
    pub async fn apps(&self) -> Vec<DiscoveredApp> {
        self.wait().await;
        self.shared.apps.get().cloned().unwrap_or_default()
    }

    /// Fetch another user's inventory through the session-authenticated trade
    /// endpoint and add it under the same first-writer-wins rule. Returns
    /// whether it was added.
    pub async fn add_foreign_inventory(&self, user_id: u64, app_id: u32, context_id: u64) -> bool {
        let pair = AppContextPair::new(app_id, context_id);
        let Some(session_id) = self.shared.pages.transport().session_id() else {
            warn!(%pair, user_id, "no web session; cannot fetch foreign inventory");
            return false;
        };
        let endpoint = InventoryEndpoint::Foreign { session_id };
        let span = info_span!("foreign_inventory", run_id = %self.shared.run_id, user_id, %pair);
        let Some(inventory) = self
            .shared
            .pages
            .fetch(&endpoint, user_id, pair)
            .instrument(span)
            .await
        else {
            return false;
        };
        let inserted = self.shared.store.insert(pair, inventory).await;
        if !inserted {
            debug!(%pair, user_id, "inventory already present; foreign inventory dropped");
        }
        inserted
    }
}
