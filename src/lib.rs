pub mod config;
pub mod inventory;
pub mod tracing;
pub mod util {
    pub mod env;
}

pub use config::InventoryConfig;
pub use inventory::{
    AggregateInventory, AppContextPair, FetchRun, Inventory, InventoryError, InventoryFetcher,
};
