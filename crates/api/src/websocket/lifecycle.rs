//! Session lifecycle orchestration
//!
//! The single authority for session state transitions, message relay, and
//! reconnection recovery. Each public method handles one inbound event and
//! may emit zero or more outbound events to one or more connections.
//!
//! Mutation order is store-first: the in-memory registry is only updated
//! after the store confirms a transition, so a failed write never leaves an
//! agent believing it holds a session the store never recorded. Races
//! between concurrent handlers (two agents accepting the same session) are
//! settled by the store's conditional writes, not by in-process state.

use std::sync::Arc;
use uuid::Uuid;

use trailtalk_shared::{AgentPresence, SenderRole, ServerEvent, SessionStatus, MAX_MESSAGE_LEN};

use crate::store::{NewMessage, NewSession, SessionStore, Transition};

use super::connection::Connection;
use super::registry::{AgentProfile, AgentRegistry};
use super::rooms::SessionRooms;

pub struct SessionLifecycle {
    store: Arc<dyn SessionStore>,
    rooms: SessionRooms,
    agents: AgentRegistry,
}

impl SessionLifecycle {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            rooms: SessionRooms::new(),
            agents: AgentRegistry::new(),
        }
    }

    /// `agent:join` — register this connection as an agent console, send it
    /// the current waiting queue, and tell other agents it came online.
    pub async fn agent_join(
        &self,
        conn: &Arc<Connection>,
        agent_id: String,
        name: String,
        email: String,
    ) {
        let profile = AgentProfile {
            agent_id,
            name,
            email,
        };
        self.agents
            .register(Arc::clone(conn), profile.clone())
            .await;

        match self.store.sessions(Some(SessionStatus::Waiting)).await {
            Ok(sessions) => {
                let _ = conn.send(ServerEvent::WaitingSessions { sessions });
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to load waiting queue");
                self.report(conn, "failed to load waiting sessions");
            }
        }

        self.broadcast_to_agents(
            ServerEvent::AgentStatus {
                status: AgentPresence::Online,
                agent_id: profile.agent_id,
                agent_name: profile.name,
            },
            Some(conn.connection_id),
        )
        .await;
    }

    /// `support:start` — create a waiting session for a visitor and announce
    /// it to every connected agent.
    pub async fn start_session(
        &self,
        conn: &Arc<Connection>,
        user_id: Option<String>,
        user_name: String,
        user_email: String,
    ) {
        if user_name.trim().is_empty() || user_email.trim().is_empty() {
            self.report(conn, "userName and userEmail are required");
            return;
        }

        let session = match self
            .store
            .create_session(NewSession {
                user_id,
                user_name,
                user_email,
            })
            .await
        {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(error = %err, "failed to create session");
                self.report(conn, "failed to start support session");
                return;
            }
        };

        tracing::info!(session_id = %session.id, "support session created");

        self.rooms.join(session.id, Arc::clone(conn)).await;
        let _ = conn.send(ServerEvent::SessionCreated {
            session_id: session.id,
        });

        self.broadcast_to_agents(ServerEvent::NewSupportRequest { session }, None)
            .await;
    }

    /// `agent:accept-session` — claim a waiting session for this agent.
    /// First claimer wins; losers get an explicit rejection.
    pub async fn accept_session(&self, conn: &Arc<Connection>, session_id: Uuid) {
        let Some(profile) = self.agents.profile(&conn.connection_id).await else {
            self.report(conn, "only registered agents can accept sessions");
            return;
        };

        let claim = self
            .store
            .claim_session(session_id, &profile.agent_id, &profile.name)
            .await;

        let session = match claim {
            Ok(Transition::Applied(session)) => session,
            Ok(Transition::Rejected(_)) => {
                let _ = conn.send(ServerEvent::SessionAlreadyClaimed { session_id });
                return;
            }
            Ok(Transition::NotFound) => {
                self.report(conn, "session not found");
                return;
            }
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %err, "claim failed");
                self.report(conn, "failed to accept session");
                return;
            }
        };

        tracing::info!(
            session_id = %session_id,
            agent_id = %profile.agent_id,
            "session accepted"
        );

        // Registry only after the store confirmed the claim.
        self.agents.assign(&conn.connection_id, session_id).await;

        // Tell the visitor who joined; the agent isn't in the room yet.
        self.rooms
            .broadcast(
                &session_id,
                ServerEvent::AgentJoined {
                    agent_id: profile.agent_id,
                    agent_name: profile.name.clone(),
                },
            )
            .await;

        self.rooms.join(session_id, Arc::clone(conn)).await;

        // Reconstruct the conversation for the accepting agent.
        match self.store.messages(session_id).await {
            Ok(messages) => {
                let _ = conn.send(ServerEvent::SessionHistory {
                    session_id,
                    messages,
                });
            }
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %err, "history load failed");
            }
        }

        self.broadcast_to_agents(
            ServerEvent::SessionStatusChanged {
                session_id,
                status: session.status,
                agent_name: session.agent_name,
            },
            None,
        )
        .await;
    }

    /// `message:send` — persist a message and relay it to every participant.
    ///
    /// Delivery is FIFO per session: the relay happens only after the
    /// persistence write completes, in the order writes are issued.
    pub async fn send_message(
        &self,
        conn: &Arc<Connection>,
        session_id: Uuid,
        body: String,
        sender_role: SenderRole,
        sender_name: String,
    ) {
        if body.trim().is_empty() {
            self.report(conn, "message body must not be empty");
            return;
        }
        if body.chars().count() > MAX_MESSAGE_LEN {
            self.report(
                conn,
                &format!("message body exceeds {MAX_MESSAGE_LEN} characters"),
            );
            return;
        }

        match self.store.session(session_id).await {
            Ok(Some(session)) if session.status == SessionStatus::Closed => {
                self.report(conn, "session is closed");
                return;
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                self.report(conn, "session not found");
                return;
            }
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %err, "session lookup failed");
                self.report(conn, "failed to send message");
                return;
            }
        }

        let message = match self
            .store
            .append_message(NewMessage {
                session_id,
                body,
                sender_role,
                sender_name,
            })
            .await
        {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %err, "message persist failed");
                self.report(conn, "failed to send message");
                return;
            }
        };

        self.rooms
            .broadcast(&session_id, ServerEvent::MessageReceived { message })
            .await;
    }

    /// `typing:start` / `typing:stop` — transient relay to the other party.
    /// Never persisted.
    pub async fn set_typing(
        &self,
        conn: &Arc<Connection>,
        session_id: Uuid,
        name: Option<String>,
        is_typing: bool,
    ) {
        self.rooms
            .broadcast_except(
                &session_id,
                conn.connection_id,
                ServerEvent::UserTyping { name, is_typing },
            )
            .await;
    }

    /// `session:close` — close a waiting or active session and notify
    /// everyone who can see it.
    pub async fn close_session(&self, conn: &Arc<Connection>, session_id: Uuid) {
        let session = match self.store.close_session(session_id).await {
            Ok(Transition::Applied(session)) => session,
            Ok(Transition::Rejected(_)) => {
                self.report(conn, "session is already closed");
                return;
            }
            Ok(Transition::NotFound) => {
                self.report(conn, "session not found");
                return;
            }
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %err, "close failed");
                self.report(conn, "failed to close session");
                return;
            }
        };

        tracing::info!(session_id = %session_id, "session closed");

        if let Some(closed_at) = session.closed_at {
            self.rooms
                .broadcast(
                    &session_id,
                    ServerEvent::SessionClosed {
                        session_id,
                        closed_at,
                    },
                )
                .await;
        }

        self.agents.unassign_session(&session_id).await;
        self.rooms.remove(&session_id).await;

        self.broadcast_to_agents(
            ServerEvent::SessionStatusChanged {
                session_id,
                status: session.status,
                agent_name: None,
            },
            None,
        )
        .await;
    }

    /// Connection teardown. For agent consoles this is the system's only
    /// recovery mechanism: every session the agent was handling reverts to
    /// the waiting queue for another (human) agent to claim.
    pub async fn handle_disconnect(&self, conn: &Arc<Connection>) {
        let removed = self.agents.unregister(&conn.connection_id).await;
        self.rooms.remove_connection(&conn.connection_id).await;

        let Some(removed) = removed else {
            // visitor socket: the session record is untouched
            return;
        };

        for session_id in removed.assigned {
            match self.store.release_session(session_id).await {
                Ok(Transition::Applied(session)) => {
                    self.rooms
                        .broadcast(
                            &session_id,
                            ServerEvent::AgentDisconnected {
                                message:
                                    "Your support agent disconnected. You will be reassigned to \
                                     the next available agent."
                                        .to_string(),
                            },
                        )
                        .await;

                    self.broadcast_to_agents(
                        ServerEvent::NewSupportRequest { session },
                        None,
                    )
                    .await;
                }
                Ok(Transition::Rejected(session)) => {
                    tracing::warn!(
                        session_id = %session_id,
                        status = %session.status,
                        "assigned session not active on agent disconnect"
                    );
                }
                Ok(Transition::NotFound) => {
                    tracing::warn!(session_id = %session_id, "assigned session missing from store");
                }
                Err(err) => {
                    tracing::error!(session_id = %session_id, error = %err, "release failed");
                }
            }
        }

        self.broadcast_to_agents(
            ServerEvent::AgentStatus {
                status: AgentPresence::Offline,
                agent_id: removed.profile.agent_id,
                agent_name: removed.profile.name,
            },
            None,
        )
        .await;
    }

    pub async fn agent_count(&self) -> usize {
        self.agents.agent_count().await
    }

    /// Fan an event out to every registered agent console, optionally
    /// skipping one connection.
    async fn broadcast_to_agents(&self, event: ServerEvent, except: Option<Uuid>) {
        for (conn, _profile) in self.agents.agents().await {
            if Some(conn.connection_id) == except {
                continue;
            }
            if conn.send(event.clone()).is_err() {
                tracing::warn!(
                    connection_id = %conn.connection_id,
                    "failed to send agent broadcast (connection closed)"
                );
            }
        }
    }

    /// Surface an error to the originating connection only.
    fn report(&self, conn: &Arc<Connection>, message: &str) {
        let _ = conn.send(ServerEvent::Error {
            message: message.to_string(),
        });
    }
}
