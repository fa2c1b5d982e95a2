pub mod job_handler;
pub mod notifier;
pub mod sources;
pub mod state_store;

pub use job_handler::*;
pub use notifier::*;
pub use sources::*;
pub use state_store::*;
