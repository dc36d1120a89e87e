use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

use super::endpoints::Endpoints;
use super::model::AppContextPair;
use super::transport::RetryingTransport;
use super::wire::{decode_map_or_empty_array, lenient_number, map_or_empty_array};

fn app_context_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"var\s+g_rgAppContextData\s*=\s*").expect("static regex is valid")
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppContext {
    #[serde(default, deserialize_with = "lenient_number")]
    pub asset_count: u64,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// One app listed on the profile inventory page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredApp {
    #[serde(rename = "appid", default, deserialize_with = "lenient_number")]
    pub app_id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub asset_count: u64,
    #[serde(default)]
    pub inventory_logo: Option<String>,
    #[serde(default)]
    pub trade_permissions: Option<String>,
    #[serde(rename = "rgContexts", default, deserialize_with = "map_or_empty_array")]
    pub contexts: IndexMap<String, AppContext>,
}

impl DiscoveredApp {
    /// Context ids in page order; keys that are not numbers are skipped.
    pub fn context_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.contexts.keys().filter_map(|k| k.trim().parse::<u64>().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Found(Vec<DiscoveredApp>),
    /// The page has no app/context table; the profile (or its inventory) is
    /// most likely private.
    Private,
    /// The table is there but could not be decoded.
    Malformed,
}

impl DiscoveryOutcome {
    /// Distinct pairs in page order.
    pub fn pairs(&self) -> Vec<AppContextPair> {
        match self {
            DiscoveryOutcome::Found(apps) => apps
                .iter()
                .flat_map(|app| {
                    app.context_ids()
                        .map(move |ctx| AppContextPair::new(app.app_id, ctx))
                })
                .collect::<IndexSet<_>>()
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Pull the `g_rgAppContextData` table out of a profile inventory page.
/// `None` when the marker is absent; `Some(Err)` when the JSON after it is bad.
pub fn extract_app_contexts(page: &str) -> Option<Result<Vec<DiscoveredApp>, serde_json::Error>> {
    let marker = app_context_marker().find(page)?;
    let mut stream =
        serde_json::Deserializer::from_str(&page[marker.end()..]).into_iter::<Value>();
    let value = match stream.next() {
        Some(Ok(value)) => value,
        Some(Err(e)) => return Some(Err(e)),
        None => return Some(Ok(Vec::new())),
    };
    Some(decode_map_or_empty_array::<DiscoveredApp>(value).map(|apps| {
        apps.into_iter()
            .map(|(key, mut app)| {
                if let Ok(id) = key.trim().parse::<u32>() {
                    app.app_id = id;
                }
                app
            })
            .collect()
    }))
}

/// Reads the profile inventory page once and lists the app/context pairs it exposes.
#[derive(Clone)]
pub struct ContextDiscovery {
    transport: RetryingTransport,
    endpoints: Endpoints,
}

impl ContextDiscovery {
    pub fn new(transport: RetryingTransport, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub async fn discover(&self, user_id: u64, app_filter: Option<&[u32]>) -> DiscoveryOutcome {
        let url = match self.endpoints.profile_inventory(user_id) {
            Ok(url) => url,
            Err(e) => {
                error!(user_id, error = ?e, "cannot build profile inventory url");
                return DiscoveryOutcome::Malformed;
            }
        };
        let page = self.transport.fetch(url.as_str()).await;

        match extract_app_contexts(&page) {
            None => {
                warn!(user_id, page_len = page.len(), "no app context data on profile page; profile is likely private");
                DiscoveryOutcome::Private
            }
            Some(Err(e)) => {
                error!(user_id, error = %e, "failed to parse app context data");
                DiscoveryOutcome::Malformed
            }
            Some(Ok(apps)) => {
                let total = apps.len();
                let apps: Vec<DiscoveredApp> = apps
                    .into_iter()
                    .filter(|app| app_filter.map_or(true, |allow| allow.contains(&app.app_id)))
                    .collect();
                for app in &apps {
                    debug!(user_id, app_id = app.app_id, name = %app.name, contexts = app.contexts.len(), "discovered app");
                }
                info!(user_id, apps = apps.len(), filtered_out = total - apps.len(), "discovered inventories");
                DiscoveryOutcome::Found(apps)
            }
        }
    }
}
