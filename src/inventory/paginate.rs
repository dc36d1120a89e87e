use tracing::{debug, warn};

use super::endpoints::{Endpoints, InventoryEndpoint};
use super::model::{AppContextPair, Inventory};
use super::transport::RetryingTransport;

/// Fetches one `(app, context)` listing and follows its `more_start` cursor
/// until the server says there is nothing left.
#[derive(Clone)]
pub struct PaginatingFetcher {
    transport: RetryingTransport,
    endpoints: Endpoints,
    max_pages: u32,
}

impl PaginatingFetcher {
    pub fn new(transport: RetryingTransport, endpoints: Endpoints, max_pages: u32) -> Self {
        Self {
            transport,
            endpoints,
            max_pages: max_pages.max(1),
        }
    }

    pub fn transport(&self) -> &RetryingTransport {
        &self.transport
    }

    /// `None` when any page is unreadable or the listing does not terminate
    /// within `max_pages`; partial listings are never returned.
    pub async fn fetch(
        &self,
        endpoint: &InventoryEndpoint,
        user_id: u64,
        pair: AppContextPair,
    ) -> Option<Inventory> {
        let mut merged: Option<Inventory> = None;
        let mut start = 0u32;

        for page_no in 0..self.max_pages {
            let url = match self.endpoints.inventory_page(endpoint, user_id, pair, start) {
                Ok(url) => url,
                Err(e) => {
                    warn!(%pair, user_id, error = ?e, "cannot build inventory url");
                    return None;
                }
            };
            let body = self.transport.fetch(url.as_str()).await;
            let page = match Inventory::from_json(&body) {
                Ok(page) => page,
                Err(e) => {
                    warn!(%pair, user_id, url = %url, error = %e, "failed to deserialize inventory page");
                    return None;
                }
            };
            let (more, next) = (page.more, page.more_start);
            debug!(%pair, page_no, start, items = page.len(), more, "inventory page");

            match merged.as_mut() {
                Some(acc) => acc.absorb(page),
                None => merged = Some(page),
            }

            if !more {
                let mut inventory = merged?;
                inventory.stamp(pair, user_id);
                return Some(inventory);
            }
            if next <= start {
                warn!(%pair, user_id, start, next, "pagination cursor did not advance");
                return None;
            }
            start = next;
        }

        warn!(%pair, user_id, max_pages = self.max_pages, "inventory exceeded page limit");
        None
    }
}
