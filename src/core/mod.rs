//! Core gateway functionality
//!
//! Model identity resolution, the provider registry and sync engine, routing
//! (scores, cooldowns, dispatch), the upstream forwarder, and the retry
//! orchestrator that ties them together.

pub mod alias;
pub mod models;
pub mod orchestrator;
pub mod proxy;
pub mod registry;
pub mod router;
pub mod sync;

pub use orchestrator::Orchestrator;
pub use registry::{MemoryProviderStore, ProviderRegistry, ProviderStore};
