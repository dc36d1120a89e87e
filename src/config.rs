use std::time::Duration;

use crate::util::env::{env_opt, env_parse};

pub const DEFAULT_COMMUNITY_BASE: &str = "https://steamcommunity.com";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;
pub const DEFAULT_MAX_PAGES: u32 = 200;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0 Safari/537.36";

/// Knobs for the inventory pipeline.
///
/// Env overrides (see [`InventoryConfig::from_env`]):
/// - STEAM_COMMUNITY_BASE: scheme + host of the community site
/// - INVENTORY_MAX_ATTEMPTS / INVENTORY_RETRY_DELAY_MS: retry budget per request
/// - INVENTORY_MAX_CONCURRENCY: parallel pair fetches per run (default 16)
/// - INVENTORY_MAX_PAGES: cap on pagination continuations per pair
/// - INVENTORY_REQUEST_TIMEOUT_SECS: per-request HTTP timeout
/// - STEAM_USER_AGENT, STEAM_SESSION_ID, STEAM_COOKIE: session material for the HTTP client
#[derive(Clone, Debug)]
pub struct InventoryConfig {
    pub community_base: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub max_concurrency: usize,
    pub max_pages: u32,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub session_id: Option<String>,
    pub cookie: Option<String>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            community_base: DEFAULT_COMMUNITY_BASE.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_pages: DEFAULT_MAX_PAGES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            session_id: None,
            cookie: None,
        }
    }
}

impl InventoryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let community_base = env_opt("STEAM_COMMUNITY_BASE")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.community_base);
        Self {
            community_base,
            max_attempts: env_parse("INVENTORY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS).max(1),
            retry_delay: Duration::from_millis(env_parse(
                "INVENTORY_RETRY_DELAY_MS",
                DEFAULT_RETRY_DELAY_MS,
            )),
            max_concurrency: env_parse("INVENTORY_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)
                .max(1),
            max_pages: env_parse("INVENTORY_MAX_PAGES", DEFAULT_MAX_PAGES).max(1),
            request_timeout: Duration::from_secs(env_parse(
                "INVENTORY_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            user_agent: env_opt("STEAM_USER_AGENT").unwrap_or(defaults.user_agent),
            session_id: env_opt("STEAM_SESSION_ID"),
            cookie: env_opt("STEAM_COOKIE").map(|s| s.trim().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_budget() {
        let cfg = InventoryConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.retry_delay, Duration::from_millis(1000));
        assert_eq!(cfg.community_base, "https://steamcommunity.com");
        assert!(cfg.session_id.is_none());
    }

    #[test]
    fn from_env_trims_base_and_clamps_zero() {
        std::env::set_var("STEAM_COMMUNITY_BASE", "http://localhost:8080/ ");
        std::env::set_var("INVENTORY_MAX_CONCURRENCY", "0");
        let cfg = InventoryConfig::from_env();
        std::env::remove_var("STEAM_COMMUNITY_BASE");
        std::env::remove_var("INVENTORY_MAX_CONCURRENCY");
        assert_eq!(cfg.community_base, "http://localhost:8080");
        assert_eq!(cfg.max_concurrency, 1);
    }
}
