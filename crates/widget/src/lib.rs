//! TrailTalk Widget
//!
//! Visitor-side state container for one support-chat session. Holds the
//! local view of the conversation (status, messages, typing flag), exposes
//! intent methods that emit wire events toward the server, and manages a
//! bounded reconnection policy for the transport.
//!
//! The container is purely reactive: intents never update the local view;
//! a transition only becomes visible once the corresponding server event is
//! folded in via [`session::ChatWidget::apply`].

pub mod reconnect;
pub mod session;

pub use reconnect::{ReconnectError, ReconnectPolicy};
pub use session::{ChatWidget, WidgetError, WidgetStatus};
