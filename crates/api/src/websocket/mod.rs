//! Real-time support channel
//!
//! # Architecture
//!
//! - **Connection**: one live WebSocket connection with its outbound channel
//! - **Rooms**: per-session pub/sub for relaying events to participants
//! - **Registry**: in-memory registry of connected support agents and their
//!   assigned sessions
//! - **Lifecycle**: the single authority for session state transitions,
//!   message relay, and reconnection recovery
//! - **Handler**: Axum WebSocket route handler and event dispatch

pub mod connection;
pub mod handler;
pub mod lifecycle;
pub mod registry;
pub mod rooms;

pub use connection::Connection;
pub use handler::ws_handler;
pub use lifecycle::SessionLifecycle;
pub use registry::{AgentProfile, AgentRegistry};
