//! TrailTalk API Library
//!
//! This crate contains the support-chat server components: the WebSocket
//! lifecycle manager, the agent connection registry, the durable session
//! store, and a small read-only REST surface for agent dashboards.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
