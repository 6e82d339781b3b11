//! Routing: cooldowns, scoring, and provider selection

pub mod cooldown;
pub mod dispatcher;
pub mod score;

pub use cooldown::{CooldownMap, CooldownState};
pub use dispatcher::{Dispatcher, Selection};
pub use score::{RoutingStat, ScoreTracker};
