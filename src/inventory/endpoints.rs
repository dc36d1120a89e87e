use anyhow::{Context, Result};
use url::Url;

use super::error::InventoryError;
use super::model::AppContextPair;

/// Which listing a paginated fetch reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEndpoint {
    /// `/profiles/{user}/inventory/json/{app}/{context}/`
    Profile,
    /// `/trade/{user}/foreigninventory/`, needs a logged-in session id.
    Foreign { session_id: String },
}

/// URL templates rooted at the community site base.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: &str) -> Result<Self, InventoryError> {
        let trimmed = base.trim();
        let with_slash = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        let base = Url::parse(&with_slash).map_err(|e| InventoryError::InvalidUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(InventoryError::InvalidUrl {
                url: trimmed.to_string(),
                reason: "not a base url".into(),
            });
        }
        Ok(Self { base })
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("cannot join {path} onto {}", self.base))
    }

    pub fn profile_inventory(&self, user_id: u64) -> Result<Url> {
        self.join(&format!("profiles/{user_id}/inventory/"))
    }

    pub fn inventory_page(
        &self,
        endpoint: &InventoryEndpoint,
        user_id: u64,
        pair: AppContextPair,
        start: u32,
    ) -> Result<Url> {
        let mut url = match endpoint {
            InventoryEndpoint::Profile => self.join(&format!(
                "profiles/{user_id}/inventory/json/{}/{}/",
                pair.app_id, pair.context_id
            ))?,
            InventoryEndpoint::Foreign { session_id } => {
                let mut url = self.join(&format!("trade/{user_id}/foreigninventory/"))?;
                url.query_pairs_mut()
                    .append_pair("sessionid", session_id)
                    .append_pair("steamid", &user_id.to_string())
                    .append_pair("appid", &pair.app_id.to_string())
                    .append_pair("contextid", &pair.context_id.to_string());
                url
            }
        };
        url.query_pairs_mut()
            .append_pair("start", &start.to_string());
        Ok(url)
    }
}
