//! Steam community inventory fetching: context discovery, paginated inventory
//! reads, and a run handle that gates readers until every fetch has concluded.
pub mod discovery;
pub mod endpoints;
pub mod error;
pub mod gate;
pub mod model;
pub mod orchestrator;
pub mod paginate;
pub mod store;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod testing;

pub use discovery::{DiscoveredApp, DiscoveryOutcome};
pub use error::InventoryError;
pub use model::{
    AggregateInventory, AppContextPair, Inventory, InventoryItem, ItemDescription,
};
pub use orchestrator::{FetchRun, InventoryFetcher, RunOutcome, RunState};
pub use transport::{CommunityClient, RetryPolicy, RetryingTransport, WebFetch};
