//! Local session state container

use tokio::sync::mpsc;
use uuid::Uuid;

use trailtalk_shared::{ClientEvent, SenderRole, ServerEvent, SupportMessage, MAX_MESSAGE_LEN};

/// Local view of the session lifecycle, as far as the server has confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetStatus {
    /// No session requested yet (or a start request is still in flight).
    Idle,
    /// The session is queued for an agent.
    Waiting,
    /// An agent is handling the session.
    Active,
    /// The session was closed.
    Closed,
    /// The transport gave up reconnecting; manual recovery (page reload)
    /// is required.
    Disconnected,
}

/// Errors from intent methods. These are local failures only; server-side
/// rejections arrive as [`ServerEvent::Error`] through `apply`.
#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("no session to operate on")]
    NoSession,

    #[error("session is closed")]
    SessionClosed,

    #[error("transport channel closed")]
    ChannelClosed,
}

/// The agent currently handling the session, as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
    pub agent_id: String,
    pub agent_name: String,
}

/// State container for one visitor chat session.
///
/// Outbound intents go through the channel handed to [`ChatWidget::new`];
/// the transport task feeds inbound events back through [`ChatWidget::apply`].
#[derive(Debug)]
pub struct ChatWidget {
    status: WidgetStatus,
    session_id: Option<Uuid>,
    user_name: String,
    messages: Vec<SupportMessage>,
    agent: Option<AgentInfo>,
    agent_typing: bool,
    outbound: mpsc::UnboundedSender<ClientEvent>,
}

impl ChatWidget {
    pub fn new(outbound: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self {
            status: WidgetStatus::Idle,
            session_id: None,
            user_name: String::new(),
            messages: Vec::new(),
            agent: None,
            agent_typing: false,
            outbound,
        }
    }

    // =========================================================================
    // Intents
    // =========================================================================

    /// Request a new support session. The widget stays `Idle` until the
    /// server confirms with `session:created`.
    pub fn start_session(
        &mut self,
        user_id: Option<String>,
        user_name: &str,
        user_email: &str,
    ) -> Result<(), WidgetError> {
        if user_name.trim().is_empty() || user_email.trim().is_empty() {
            return Err(WidgetError::Validation(
                "name and email are required".to_string(),
            ));
        }

        self.user_name = user_name.to_string();
        self.emit(ClientEvent::StartSession {
            user_id,
            user_name: user_name.to_string(),
            user_email: user_email.to_string(),
        })
    }

    /// Send a chat message. The message shows up locally only once the
    /// server relays it back as `message:received`.
    pub fn send_message(&mut self, body: &str) -> Result<(), WidgetError> {
        let session_id = self.usable_session()?;

        if body.trim().is_empty() {
            return Err(WidgetError::Validation(
                "message must not be empty".to_string(),
            ));
        }
        if body.chars().count() > MAX_MESSAGE_LEN {
            return Err(WidgetError::Validation(format!(
                "message exceeds {MAX_MESSAGE_LEN} characters"
            )));
        }

        self.emit(ClientEvent::SendMessage {
            session_id,
            message: body.to_string(),
            sender_type: SenderRole::User,
            sender_name: self.user_name.clone(),
        })
    }

    pub fn start_typing(&mut self) -> Result<(), WidgetError> {
        let session_id = self.usable_session()?;
        let name = Some(self.user_name.clone());
        self.emit(ClientEvent::TypingStart { session_id, name })
    }

    pub fn stop_typing(&mut self) -> Result<(), WidgetError> {
        let session_id = self.usable_session()?;
        let name = Some(self.user_name.clone());
        self.emit(ClientEvent::TypingStop { session_id, name })
    }

    pub fn close_session(&mut self) -> Result<(), WidgetError> {
        let session_id = self.usable_session()?;
        self.emit(ClientEvent::CloseSession { session_id })
    }

    // =========================================================================
    // Inbound events
    // =========================================================================

    /// Fold one server event into the local view. Events for other sessions
    /// and event kinds the widget does not care about are ignored.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::SessionCreated { session_id } => {
                self.session_id = Some(*session_id);
                self.status = WidgetStatus::Waiting;
            }

            ServerEvent::AgentJoined {
                agent_id,
                agent_name,
            } => {
                self.agent = Some(AgentInfo {
                    agent_id: agent_id.clone(),
                    agent_name: agent_name.clone(),
                });
                self.status = WidgetStatus::Active;
            }

            ServerEvent::MessageReceived { message } => {
                if self.session_id == Some(message.session_id) {
                    self.messages.push(message.clone());
                }
            }

            ServerEvent::UserTyping { is_typing, .. } => {
                self.agent_typing = *is_typing;
            }

            ServerEvent::SessionClosed { session_id, .. } => {
                if self.session_id == Some(*session_id) {
                    self.status = WidgetStatus::Closed;
                    self.agent_typing = false;
                }
            }

            ServerEvent::AgentDisconnected { .. } => {
                // back in the queue for the next available agent
                self.agent = None;
                self.agent_typing = false;
                if self.status == WidgetStatus::Active {
                    self.status = WidgetStatus::Waiting;
                }
            }

            ServerEvent::SessionHistory {
                session_id,
                messages,
            } => {
                if self.session_id == Some(*session_id) {
                    self.messages = messages.clone();
                }
            }

            ServerEvent::Error { message } => {
                tracing::warn!(message = %message, "support channel error");
            }

            // agent-console events; nothing to fold in on the visitor side
            _ => {}
        }
    }

    /// Mark the widget disconnected after the transport exhausted its
    /// reconnection attempts. Terminal until manual recovery.
    pub fn mark_disconnected(&mut self) {
        self.status = WidgetStatus::Disconnected;
        self.agent_typing = false;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn status(&self) -> WidgetStatus {
        self.status
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn messages(&self) -> &[SupportMessage] {
        &self.messages
    }

    pub fn agent(&self) -> Option<&AgentInfo> {
        self.agent.as_ref()
    }

    pub fn is_agent_typing(&self) -> bool {
        self.agent_typing
    }

    fn usable_session(&self) -> Result<Uuid, WidgetError> {
        match self.status {
            WidgetStatus::Closed => Err(WidgetError::SessionClosed),
            _ => self.session_id.ok_or(WidgetError::NoSession),
        }
    }

    fn emit(&self, event: ClientEvent) -> Result<(), WidgetError> {
        self.outbound
            .send(event)
            .map_err(|_| WidgetError::ChannelClosed)
    }
}
