//! End-to-end lifecycle tests against the in-memory store
//!
//! Connections are simulated with channel-backed handles, so every outbound
//! event the lifecycle manager emits can be asserted on directly.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use trailtalk_api::store::{MemorySessionStore, SessionStore};
use trailtalk_api::websocket::{Connection, SessionLifecycle};
use trailtalk_shared::{AgentPresence, SenderRole, ServerEvent, SessionStatus};

struct TestClient {
    conn: Arc<Connection>,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl TestClient {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            conn: Arc::new(Connection::new(tx)),
            rx,
        }
    }

    /// Next queued event; panics if none is pending.
    fn next(&mut self) -> ServerEvent {
        self.rx.try_recv().expect("expected a pending event")
    }

    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

fn setup() -> (Arc<MemorySessionStore>, SessionLifecycle) {
    let store = Arc::new(MemorySessionStore::new());
    let lifecycle = SessionLifecycle::new(store.clone() as Arc<dyn SessionStore>);
    (store, lifecycle)
}

async fn join_agent(lifecycle: &SessionLifecycle, client: &mut TestClient, id: &str, name: &str) {
    lifecycle
        .agent_join(
            &client.conn,
            id.to_string(),
            name.to_string(),
            format!("{id}@support.example"),
        )
        .await;
}

/// Start a session for "Alice" and return its ID, draining the visitor's
/// `session:created` ack.
async fn start_alice_session(lifecycle: &SessionLifecycle, visitor: &mut TestClient) -> Uuid {
    lifecycle
        .start_session(
            &visitor.conn,
            None,
            "Alice".to_string(),
            "alice@x.com".to_string(),
        )
        .await;

    match visitor.next() {
        ServerEvent::SessionCreated { session_id } => session_id,
        other => panic!("expected session:created, got {other:?}"),
    }
}

#[tokio::test]
async fn start_session_queues_waiting_and_broadcasts_to_agents() {
    let (store, lifecycle) = setup();
    let mut agent = TestClient::new();
    let mut visitor = TestClient::new();

    join_agent(&lifecycle, &mut agent, "a-1", "Dana").await;
    agent.drain(); // waiting-sessions on join

    let session_id = start_alice_session(&lifecycle, &mut visitor).await;

    // persisted record: waiting, unassigned
    let session = store.session(session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Waiting);
    assert_eq!(session.agent_id, None);
    assert_eq!(session.user_name, "Alice");

    // every agent saw the new request
    match agent.next() {
        ServerEvent::NewSupportRequest { session } => {
            assert_eq!(session.id, session_id);
            assert_eq!(session.status, SessionStatus::Waiting);
        }
        other => panic!("expected new-support-request, got {other:?}"),
    }
}

#[tokio::test]
async fn start_session_rejects_blank_identity() {
    let (store, lifecycle) = setup();
    let mut visitor = TestClient::new();

    lifecycle
        .start_session(&visitor.conn, None, "  ".to_string(), "".to_string())
        .await;

    assert!(matches!(visitor.next(), ServerEvent::Error { .. }));
    assert!(store.sessions(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn joining_agent_receives_waiting_queue() {
    let (_store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;

    let mut agent = TestClient::new();
    join_agent(&lifecycle, &mut agent, "a-1", "Dana").await;

    match agent.next() {
        ServerEvent::WaitingSessions { sessions } => {
            assert_eq!(sessions.len(), 1);
            assert_eq!(sessions[0].id, session_id);
        }
        other => panic!("expected waiting-sessions, got {other:?}"),
    }
}

#[tokio::test]
async fn agent_join_announces_presence_to_other_agents() {
    let (_store, lifecycle) = setup();
    let mut first = TestClient::new();
    let mut second = TestClient::new();

    join_agent(&lifecycle, &mut first, "a-1", "Dana").await;
    first.drain();

    join_agent(&lifecycle, &mut second, "a-2", "Eli").await;

    let events = first.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::AgentStatus {
            status: AgentPresence::Online,
            agent_id,
            ..
        } if agent_id == "a-2"
    )));

    // the joining agent does not see its own presence event
    let second_events = second.drain();
    assert!(!second_events
        .iter()
        .any(|e| matches!(e, ServerEvent::AgentStatus { .. })));
}

#[tokio::test]
async fn accept_binds_agent_and_notifies_everyone() {
    let (store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let mut dana = TestClient::new();
    let mut eli = TestClient::new();

    join_agent(&lifecycle, &mut dana, "a-1", "Dana").await;
    join_agent(&lifecycle, &mut eli, "a-2", "Eli").await;
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;
    dana.drain();
    eli.drain();

    lifecycle.accept_session(&dana.conn, session_id).await;

    // persisted: active, bound to Dana
    let session = store.session(session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.agent_id.as_deref(), Some("a-1"));
    assert_eq!(session.agent_name.as_deref(), Some("Dana"));

    // the visitor learns who joined
    match visitor.next() {
        ServerEvent::AgentJoined {
            agent_id,
            agent_name,
        } => {
            assert_eq!(agent_id, "a-1");
            assert_eq!(agent_name, "Dana");
        }
        other => panic!("expected agent:joined, got {other:?}"),
    }

    // the accepting agent gets the (empty) transcript
    let dana_events = dana.drain();
    assert!(dana_events.iter().any(|e| matches!(
        e,
        ServerEvent::SessionHistory { session_id: sid, messages } if *sid == session_id && messages.is_empty()
    )));

    // other agents see the queue update
    let eli_events = eli.drain();
    assert!(eli_events.iter().any(|e| matches!(
        e,
        ServerEvent::SessionStatusChanged { session_id: sid, status: SessionStatus::Active, .. }
            if *sid == session_id
    )));
}

#[tokio::test]
async fn accept_race_has_exactly_one_winner() {
    let (store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let mut dana = TestClient::new();
    let mut eli = TestClient::new();

    join_agent(&lifecycle, &mut dana, "a-1", "Dana").await;
    join_agent(&lifecycle, &mut eli, "a-2", "Eli").await;
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;
    dana.drain();
    eli.drain();

    lifecycle.accept_session(&dana.conn, session_id).await;
    lifecycle.accept_session(&eli.conn, session_id).await;

    // Dana won; Eli's attempt left no observable effect on the record
    let session = store.session(session_id).await.unwrap().unwrap();
    assert_eq!(session.agent_id.as_deref(), Some("a-1"));
    assert_eq!(session.status, SessionStatus::Active);

    // the loser was told explicitly
    let eli_events = eli.drain();
    assert!(eli_events.iter().any(|e| matches!(
        e,
        ServerEvent::SessionAlreadyClaimed { session_id: sid } if *sid == session_id
    )));
}

#[tokio::test]
async fn accept_requires_agent_registration() {
    let (store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let mut stranger = TestClient::new();

    let session_id = start_alice_session(&lifecycle, &mut visitor).await;

    lifecycle.accept_session(&stranger.conn, session_id).await;

    assert!(matches!(stranger.next(), ServerEvent::Error { .. }));
    let session = store.session(session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Waiting);
}

#[tokio::test]
async fn accept_unknown_session_reports_not_found() {
    let (_store, lifecycle) = setup();
    let mut dana = TestClient::new();
    join_agent(&lifecycle, &mut dana, "a-1", "Dana").await;
    dana.drain();

    lifecycle.accept_session(&dana.conn, Uuid::new_v4()).await;

    assert!(matches!(dana.next(), ServerEvent::Error { .. }));
}

#[tokio::test]
async fn messages_are_relayed_fifo_to_all_participants() {
    let (store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let mut dana = TestClient::new();

    join_agent(&lifecycle, &mut dana, "a-1", "Dana").await;
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;
    dana.drain();
    lifecycle.accept_session(&dana.conn, session_id).await;
    visitor.drain();
    dana.drain();

    for i in 1..=5 {
        lifecycle
            .send_message(
                &visitor.conn,
                session_id,
                format!("m{i}"),
                SenderRole::User,
                "Alice".to_string(),
            )
            .await;
    }

    let received = |events: Vec<ServerEvent>| -> Vec<String> {
        events
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::MessageReceived { message } => Some(message.body),
                _ => None,
            })
            .collect()
    };

    let expected = ["m1", "m2", "m3", "m4", "m5"];
    assert_eq!(received(visitor.drain()), expected);
    assert_eq!(received(dana.drain()), expected);

    // and they were persisted in the same order
    let stored: Vec<_> = store
        .messages(session_id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.body)
        .collect();
    assert_eq!(stored, expected);
}

#[tokio::test]
async fn oversized_and_empty_messages_are_rejected() {
    let (store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;

    lifecycle
        .send_message(
            &visitor.conn,
            session_id,
            "   ".to_string(),
            SenderRole::User,
            "Alice".to_string(),
        )
        .await;
    assert!(matches!(visitor.next(), ServerEvent::Error { .. }));

    lifecycle
        .send_message(
            &visitor.conn,
            session_id,
            "x".repeat(2001),
            SenderRole::User,
            "Alice".to_string(),
        )
        .await;
    assert!(matches!(visitor.next(), ServerEvent::Error { .. }));

    assert!(store.messages(session_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn messages_to_closed_or_missing_sessions_are_rejected() {
    let (store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;

    lifecycle.close_session(&visitor.conn, session_id).await;
    visitor.drain();

    lifecycle
        .send_message(
            &visitor.conn,
            session_id,
            "anyone there?".to_string(),
            SenderRole::User,
            "Alice".to_string(),
        )
        .await;
    assert!(matches!(visitor.next(), ServerEvent::Error { .. }));
    assert!(store.messages(session_id).await.unwrap().is_empty());

    lifecycle
        .send_message(
            &visitor.conn,
            Uuid::new_v4(),
            "hello".to_string(),
            SenderRole::User,
            "Alice".to_string(),
        )
        .await;
    assert!(matches!(visitor.next(), ServerEvent::Error { .. }));
}

#[tokio::test]
async fn typing_indicator_reaches_only_the_other_party() {
    let (_store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let mut dana = TestClient::new();

    join_agent(&lifecycle, &mut dana, "a-1", "Dana").await;
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;
    dana.drain();
    lifecycle.accept_session(&dana.conn, session_id).await;
    visitor.drain();
    dana.drain();

    lifecycle
        .set_typing(&visitor.conn, session_id, Some("Alice".to_string()), true)
        .await;

    assert!(matches!(
        dana.next(),
        ServerEvent::UserTyping {
            is_typing: true,
            ..
        }
    ));
    // no echo to the typist
    assert!(visitor.drain().is_empty());
}

#[tokio::test]
async fn closing_a_waiting_session_succeeds() {
    let (store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;

    lifecycle.close_session(&visitor.conn, session_id).await;

    match visitor.next() {
        ServerEvent::SessionClosed {
            session_id: sid, ..
        } => assert_eq!(sid, session_id),
        other => panic!("expected session:closed, got {other:?}"),
    }

    let session = store.session(session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Closed);
    assert!(session.closed_at.is_some());
}

#[tokio::test]
async fn closing_twice_reports_an_error() {
    let (_store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;

    lifecycle.close_session(&visitor.conn, session_id).await;
    visitor.drain();

    lifecycle.close_session(&visitor.conn, session_id).await;
    assert!(matches!(visitor.next(), ServerEvent::Error { .. }));
}

#[tokio::test]
async fn close_unassigns_the_handling_agent() {
    let (_store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let mut dana = TestClient::new();
    let mut eli = TestClient::new();

    join_agent(&lifecycle, &mut dana, "a-1", "Dana").await;
    join_agent(&lifecycle, &mut eli, "a-2", "Eli").await;
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;
    dana.drain();
    eli.drain();
    lifecycle.accept_session(&dana.conn, session_id).await;
    visitor.drain();
    dana.drain();
    eli.drain();

    lifecycle.close_session(&dana.conn, session_id).await;

    // Dana no longer holds the session: her disconnect reverts nothing
    lifecycle.handle_disconnect(&dana.conn).await;
    let eli_events = eli.drain();
    assert!(!eli_events
        .iter()
        .any(|e| matches!(e, ServerEvent::NewSupportRequest { .. })));
}

#[tokio::test]
async fn agent_disconnect_reverts_every_held_session() {
    let (store, lifecycle) = setup();
    let mut alice = TestClient::new();
    let mut bob = TestClient::new();
    let mut dana = TestClient::new();
    let mut eli = TestClient::new();

    join_agent(&lifecycle, &mut dana, "a-1", "Dana").await;
    join_agent(&lifecycle, &mut eli, "a-2", "Eli").await;

    let session_a = start_alice_session(&lifecycle, &mut alice).await;
    lifecycle
        .start_session(&bob.conn, None, "Bob".to_string(), "bob@x.com".to_string())
        .await;
    let session_b = match bob.next() {
        ServerEvent::SessionCreated { session_id } => session_id,
        other => panic!("expected session:created, got {other:?}"),
    };

    dana.drain();
    eli.drain();
    lifecycle.accept_session(&dana.conn, session_a).await;
    lifecycle.accept_session(&dana.conn, session_b).await;
    alice.drain();
    bob.drain();
    eli.drain();

    lifecycle.handle_disconnect(&dana.conn).await;

    // exactly k = 2 sessions reverted to waiting with agent fields cleared
    for session_id in [session_a, session_b] {
        let session = store.session(session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Waiting);
        assert_eq!(session.agent_id, None);
        assert_eq!(session.agent_name, None);
    }

    // both visitors were told their agent dropped
    assert!(alice
        .drain()
        .iter()
        .any(|e| matches!(e, ServerEvent::AgentDisconnected { .. })));
    assert!(bob
        .drain()
        .iter()
        .any(|e| matches!(e, ServerEvent::AgentDisconnected { .. })));

    // the remaining agent got both sessions re-broadcast as fresh requests,
    // plus Dana's offline presence
    let eli_events = eli.drain();
    let rebroadcast: Vec<Uuid> = eli_events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::NewSupportRequest { session } => {
                assert_eq!(session.status, SessionStatus::Waiting);
                assert_eq!(session.agent_id, None);
                Some(session.id)
            }
            _ => None,
        })
        .collect();
    assert_eq!(rebroadcast.len(), 2);
    assert!(rebroadcast.contains(&session_a));
    assert!(rebroadcast.contains(&session_b));

    assert!(eli_events.iter().any(|e| matches!(
        e,
        ServerEvent::AgentStatus {
            status: AgentPresence::Offline,
            agent_id,
            ..
        } if agent_id == "a-1"
    )));
}

#[tokio::test]
async fn visitor_disconnect_leaves_session_untouched() {
    let (store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let mut dana = TestClient::new();

    join_agent(&lifecycle, &mut dana, "a-1", "Dana").await;
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;
    dana.drain();

    lifecycle.handle_disconnect(&visitor.conn).await;

    let session = store.session(session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Waiting);
    assert_eq!(lifecycle.agent_count().await, 1);
    // no reassignment noise for the agent
    assert!(dana.drain().is_empty());
}

#[tokio::test]
async fn reaccept_after_disconnect_hands_over_the_transcript() {
    let (_store, lifecycle) = setup();
    let mut visitor = TestClient::new();
    let mut dana = TestClient::new();
    let mut eli = TestClient::new();

    join_agent(&lifecycle, &mut dana, "a-1", "Dana").await;
    join_agent(&lifecycle, &mut eli, "a-2", "Eli").await;
    let session_id = start_alice_session(&lifecycle, &mut visitor).await;
    dana.drain();
    eli.drain();

    lifecycle.accept_session(&dana.conn, session_id).await;
    lifecycle
        .send_message(
            &visitor.conn,
            session_id,
            "my booking is missing".to_string(),
            SenderRole::User,
            "Alice".to_string(),
        )
        .await;
    lifecycle.handle_disconnect(&dana.conn).await;
    visitor.drain();
    eli.drain();

    lifecycle.accept_session(&eli.conn, session_id).await;

    let eli_events = eli.drain();
    let history = eli_events.iter().find_map(|e| match e {
        ServerEvent::SessionHistory { messages, .. } => Some(messages),
        _ => None,
    });
    let history = history.expect("expected session history on re-accept");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].body, "my booking is missing");
}
