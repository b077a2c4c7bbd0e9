pub mod delivery;
pub mod engine;
pub mod model;
pub mod registry;
pub mod store;

pub use delivery::{classify, Deliverer, DeliveryOutcome};
pub use engine::{DeliveryEngine, EngineConfig};
pub use model::{Job, NewJob};
pub use registry::JobRegistry;
pub use store::{JobStore, PgJobStore};
