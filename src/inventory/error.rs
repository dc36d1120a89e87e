use thiserror::Error;

/// Errors surfaced to callers of the inventory pipeline.
///
/// Network and decode faults are absorbed inside the pipeline and never show up
/// here; only lookups against a finished run and unusable endpoint bases do.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("inventory not found for app {app_id} context {context_id}")]
    NotFound { app_id: u32, context_id: u64 },
    #[error("invalid endpoint url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}
