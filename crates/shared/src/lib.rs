//! TrailTalk Shared Types and Utilities
//!
//! This crate contains the support-chat domain types, the real-time wire
//! protocol, and database utilities shared between the server and the
//! visitor-side widget.

pub mod db;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::*;
pub use protocol::*;
pub use types::*;
