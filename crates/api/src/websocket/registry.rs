//! Connection registry for support agents
//!
//! Tracks which connections are agent consoles and which sessions each one
//! is actively handling. Purely in-process and ephemeral: the session store
//! is authoritative for anything that must survive a restart. An instance is
//! owned by the lifecycle manager, never a module-level singleton.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;

/// Identity an agent console announces on `agent:join`.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub agent_id: String,
    pub name: String,
    pub email: String,
}

struct AgentEntry {
    profile: AgentProfile,
    conn: Arc<Connection>,
    assigned: HashSet<Uuid>,
}

/// What `unregister` hands back so the caller can reassign the agent's
/// sessions.
pub struct RemovedAgent {
    pub profile: AgentProfile,
    pub assigned: HashSet<Uuid>,
}

pub struct AgentRegistry {
    agents: RwLock<HashMap<Uuid, AgentEntry>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Register an agent console. Idempotent per connection: re-joining
    /// refreshes the profile but keeps the assigned set.
    pub async fn register(&self, conn: Arc<Connection>, profile: AgentProfile) {
        let mut agents = self.agents.write().await;
        let connection_id = conn.connection_id;
        agents
            .entry(connection_id)
            .and_modify(|entry| entry.profile = profile.clone())
            .or_insert_with(|| AgentEntry {
                profile,
                conn,
                assigned: HashSet::new(),
            });

        tracing::info!(
            connection_id = %connection_id,
            online_agents = agents.len(),
            "agent registered"
        );
    }

    /// Remove an agent entry, returning its profile and assigned sessions.
    ///
    /// Returns None for connections that were never registered (e.g. a
    /// visitor socket disconnecting) and causes no state change in that case.
    pub async fn unregister(&self, connection_id: &Uuid) -> Option<RemovedAgent> {
        let mut agents = self.agents.write().await;
        let entry = agents.remove(connection_id)?;

        tracing::info!(
            connection_id = %connection_id,
            agent_id = %entry.profile.agent_id,
            dropped_sessions = entry.assigned.len(),
            remaining_agents = agents.len(),
            "agent unregistered"
        );

        Some(RemovedAgent {
            profile: entry.profile,
            assigned: entry.assigned,
        })
    }

    /// Record that a connection's agent is handling a session. No-op if the
    /// connection is not a registered agent or already holds the session.
    pub async fn assign(&self, connection_id: &Uuid, session_id: Uuid) {
        let mut agents = self.agents.write().await;
        if let Some(entry) = agents.get_mut(connection_id) {
            entry.assigned.insert(session_id);
        }
    }

    /// Remove a session from a connection's assigned set. No-op if absent.
    pub async fn unassign(&self, connection_id: &Uuid, session_id: &Uuid) {
        let mut agents = self.agents.write().await;
        if let Some(entry) = agents.get_mut(connection_id) {
            entry.assigned.remove(session_id);
        }
    }

    /// Remove a session from whichever agent holds it. Used on session close,
    /// where only the session is known.
    pub async fn unassign_session(&self, session_id: &Uuid) {
        let mut agents = self.agents.write().await;
        for entry in agents.values_mut() {
            entry.assigned.remove(session_id);
        }
    }

    /// Snapshot of all registered agents for broadcast fan-out.
    pub async fn agents(&self) -> Vec<(Arc<Connection>, AgentProfile)> {
        let agents = self.agents.read().await;
        agents
            .values()
            .map(|entry| (Arc::clone(&entry.conn), entry.profile.clone()))
            .collect()
    }

    /// Profile of the agent on a connection, if it registered as one.
    pub async fn profile(&self, connection_id: &Uuid) -> Option<AgentProfile> {
        let agents = self.agents.read().await;
        agents.get(connection_id).map(|e| e.profile.clone())
    }

    pub async fn agent_count(&self) -> usize {
        let agents = self.agents.read().await;
        agents.len()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn agent_conn() -> Arc<Connection> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(Connection::new(tx))
    }

    fn profile(id: &str) -> AgentProfile {
        AgentProfile {
            agent_id: id.to_string(),
            name: format!("Agent {id}"),
            email: format!("{id}@support.example"),
        }
    }

    #[tokio::test]
    async fn register_and_unregister_round_trip() {
        let registry = AgentRegistry::new();
        let conn = agent_conn();

        registry.register(Arc::clone(&conn), profile("a-1")).await;
        assert_eq!(registry.agent_count().await, 1);

        registry.assign(&conn.connection_id, Uuid::new_v4()).await;
        registry.assign(&conn.connection_id, Uuid::new_v4()).await;

        let removed = registry.unregister(&conn.connection_id).await.unwrap();
        assert_eq!(removed.profile.agent_id, "a-1");
        assert_eq!(removed.assigned.len(), 2);
        assert_eq!(registry.agent_count().await, 0);
    }

    #[tokio::test]
    async fn unregister_unknown_connection_is_noop() {
        let registry = AgentRegistry::new();
        let conn = agent_conn();
        registry.register(Arc::clone(&conn), profile("a-1")).await;

        assert!(registry.unregister(&Uuid::new_v4()).await.is_none());
        assert_eq!(registry.agent_count().await, 1);
    }

    #[tokio::test]
    async fn reregister_keeps_assigned_sessions() {
        let registry = AgentRegistry::new();
        let conn = agent_conn();
        let session_id = Uuid::new_v4();

        registry.register(Arc::clone(&conn), profile("a-1")).await;
        registry.assign(&conn.connection_id, session_id).await;
        registry.register(Arc::clone(&conn), profile("a-1")).await;

        let removed = registry.unregister(&conn.connection_id).await.unwrap();
        assert!(removed.assigned.contains(&session_id));
    }

    #[tokio::test]
    async fn assign_to_unregistered_connection_is_noop() {
        let registry = AgentRegistry::new();
        let conn = agent_conn();

        registry.assign(&conn.connection_id, Uuid::new_v4()).await;
        assert_eq!(registry.agent_count().await, 0);
    }

    #[tokio::test]
    async fn unassign_session_scans_all_agents() {
        let registry = AgentRegistry::new();
        let conn_a = agent_conn();
        let conn_b = agent_conn();
        let session_id = Uuid::new_v4();

        registry.register(Arc::clone(&conn_a), profile("a-1")).await;
        registry.register(Arc::clone(&conn_b), profile("a-2")).await;
        registry.assign(&conn_b.connection_id, session_id).await;

        registry.unassign_session(&session_id).await;

        let removed = registry.unregister(&conn_b.connection_id).await.unwrap();
        assert!(removed.assigned.is_empty());
    }
}
