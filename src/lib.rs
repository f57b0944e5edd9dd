pub mod cli;
pub mod config;
pub mod controllables;
pub mod dirty;
pub mod effectors;
pub mod events;
pub mod panel;
pub mod policy;
pub mod pool;
pub mod registry;
pub mod trigger;
pub mod undo;

pub use effectors::{EffectorCatalog, EffectorError, EffectorInstance, EffectorType};
pub use registry::{AvailableSnapshot, EffectorRegistry};
pub use trigger::{AgentKind, Trigger, TriggerId, TriggerSnapshot};
