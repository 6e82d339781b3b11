//! HTTP server implementation

pub mod routes;
pub mod server;
pub mod state;

pub use server::{build_state, HttpServer};
pub use state::AppState;
