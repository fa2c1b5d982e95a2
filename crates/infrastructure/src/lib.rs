pub mod database;
pub mod observability;
pub mod state_store;

pub use database::*;
pub use observability::*;
pub use state_store::*;
