//! In-memory `WebFetch` double and payload builders shared by the unit tests.
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use super::transport::WebFetch;

#[derive(Clone)]
enum Scripted {
    Body(String),
    Fail,
}

/// Replays scripted responses per URL. The last scripted response for a URL
/// repeats once the queue is down to it; unknown URLs fail.
#[derive(Default)]
pub struct ScriptedWeb {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
    session: Option<String>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, body: impl Into<String>) -> Self {
        self.push(url, Scripted::Body(body.into()));
        self
    }

    pub fn fail(mut self, url: &str) -> Self {
        self.push(url, Scripted::Fail);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_session(mut self, sid: &str) -> Self {
        self.session = Some(sid.to_string());
        self
    }

    fn push(&mut self, url: &str, reply: Scripted) {
        self.routes
            .get_mut()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebFetch for ScriptedWeb {
    async fn fetch(&self, url: &str, _method: Method) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = {
            let mut routes = self.routes.lock().unwrap();
            routes.get_mut(url).and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match reply {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::Fail) => Err(anyhow!("scripted failure for {url}")),
            None => Err(anyhow!("no route for {url}")),
        }
    }

    fn session_id(&self) -> Option<String> {
        self.session.clone()
    }
}

pub const BASE: &str = "https://community.test";
pub const USER: u64 = 76561198000000001;

pub fn profile_url(user: u64) -> String {
    format!("{BASE}/profiles/{user}/inventory/")
}

pub fn inventory_url(user: u64, app: u32, ctx: u64, start: u32) -> String {
    format!("{BASE}/profiles/{user}/inventory/json/{app}/{ctx}/?start={start}")
}

/// Profile page embedding an app/context table for the given `(app, [contexts])`.
pub fn profile_page(apps: &[(u32, Vec<u64>)]) -> String {
    let mut table = serde_json::Map::new();
    for (app, contexts) in apps {
        let mut rg = serde_json::Map::new();
        for ctx in contexts.iter() {
            rg.insert(
                ctx.to_string(),
                json!({"asset_count": 1, "id": ctx.to_string(), "name": "Backpack"}),
            );
        }
        table.insert(
            app.to_string(),
            json!({
                "appid": app,
                "name": format!("App {app}"),
                "icon": "https://cdn.test/icon.jpg",
                "link": format!("https://store.test/app/{app}"),
                "asset_count": contexts.len(),
                "inventory_logo": "",
                "trade_permissions": "FULL",
                "rgContexts": rg,
            }),
        );
    }
    format!(
        "<html><script>\n\t\tvar g_rgAppContextData = {};\n\t\tvar g_rgCurrency = [];\n</script></html>",
        Value::Object(table)
    )
}

/// One inventory JSON page holding regular items `(id, class_id)`.
pub fn inventory_page(items: &[(u64, u64)], more_start: Option<u32>) -> String {
    let mut rg_inventory = serde_json::Map::new();
    let mut rg_descriptions = serde_json::Map::new();
    for (pos, (id, class)) in items.iter().enumerate() {
        rg_inventory.insert(
            id.to_string(),
            json!({
                "id": id.to_string(),
                "classid": class.to_string(),
                "instanceid": "0",
                "amount": "1",
                "pos": pos + 1,
            }),
        );
        rg_descriptions.insert(
            format!("{class}_0"),
            json!({
                "appid": "440",
                "classid": class.to_string(),
                "instanceid": "0",
                "name": format!("Item {class}"),
                "tradable": 1,
                "marketable": 0,
                "commodity": 0,
            }),
        );
    }
    json!({
        "success": true,
        "rgInventory": rg_inventory,
        "rgCurrency": [],
        "rgDescriptions": rg_descriptions,
        "more": more_start.is_some(),
        "more_start": more_start.map(Value::from).unwrap_or(Value::Bool(false)),
    })
    .to_string()
}

pub fn empty_inventory_page() -> String {
    json!({
        "success": true,
        "rgInventory": [],
        "rgCurrency": [],
        "rgDescriptions": [],
        "more": false,
        "more_start": false,
    })
    .to_string()
}
