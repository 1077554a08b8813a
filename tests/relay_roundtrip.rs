//! End-to-end tests: real relay, real channel handles, real sessions.

use std::time::Duration;

use pairpad::sync::{ChannelHandle, Relay, RelayConfig, RelayHandle};
use pairpad::{ChannelEvent, ConnectionStatus, OriginId, PadError, SessionState};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn start_relay() -> RelayHandle {
    let relay = Relay::bind(RelayConfig::new("127.0.0.1:0")).await.unwrap();
    relay.spawn().unwrap()
}

async fn join(relay: &RelayHandle, origin: &str) -> ChannelHandle {
    ChannelHandle::connect_addr(&relay.local_addr().to_string(), OriginId::new(origin))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_fan_out_without_echo() {
    let relay = start_relay().await;
    let mut alice = join(&relay, "alice").await;
    let mut bob = join(&relay, "bob").await;
    let mut carol = join(&relay, "carol").await;
    timeout(WAIT, relay.wait_for_peers(3)).await.unwrap();

    let mut alice_rx = alice.remote_changes().unwrap();
    let mut bob_rx = bob.remote_changes().unwrap();
    let mut carol_rx = carol.remote_changes().unwrap();

    alice.send("from alice").unwrap();

    let at_bob = timeout(WAIT, bob_rx.recv()).await.unwrap().unwrap();
    let at_carol = timeout(WAIT, carol_rx.recv()).await.unwrap().unwrap();
    assert_eq!(at_bob, ChannelEvent::document_changed("from alice", OriginId::new("alice")));
    assert_eq!(at_carol, at_bob);

    // Alice only ever sees other people's edits.
    bob.send("from bob").unwrap();
    let at_alice = timeout(WAIT, alice_rx.recv()).await.unwrap().unwrap();
    assert!(at_alice.is_from(&OriginId::new("bob")));

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_per_sender_order_and_last_write_wins() {
    let relay = start_relay().await;
    let alice = join(&relay, "alice").await;
    let mut bob = join(&relay, "bob").await;
    timeout(WAIT, relay.wait_for_peers(2)).await.unwrap();
    let mut bob_rx = bob.remote_changes().unwrap();

    for i in 0..50 {
        alice.send(&format!("edit {i}")).unwrap();
    }

    let mut session = SessionState::new(OriginId::new("bob"));
    for i in 0..50 {
        let event = timeout(WAIT, bob_rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.content(), format!("edit {i}"));
        assert!(session.apply_remote(&event));
    }
    assert_eq!(session.content(), "edit 49");
    assert_eq!(session.revision(), 50);

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_session_broadcasts_local_edits() {
    let relay = start_relay().await;
    let alice_channel = join(&relay, "alice").await;
    let mut bob_channel = join(&relay, "bob").await;
    timeout(WAIT, relay.wait_for_peers(2)).await.unwrap();
    let mut bob_rx = bob_channel.remote_changes().unwrap();

    let mut alice = SessionState::new(OriginId::new("alice")).with_channel(alice_channel);
    let mut bob = SessionState::new(OriginId::new("bob")).with_channel(bob_channel);
    assert_eq!(alice.connection_status(), ConnectionStatus::Connected);

    alice.apply_local_edit("console.log('shared')");
    let event = timeout(WAIT, bob_rx.recv()).await.unwrap().unwrap();
    assert!(bob.apply_remote(&event));
    assert_eq!(bob.content(), "console.log('shared')");

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_oversized_edit_keeps_peers_converging() {
    let relay = start_relay().await;
    let alice = join(&relay, "alice").await;
    let mut bob = join(&relay, "bob").await;
    timeout(WAIT, relay.wait_for_peers(2)).await.unwrap();
    let mut bob_rx = bob.remote_changes().unwrap();

    let huge = "x".repeat(2 * 1024 * 1024);
    assert!(matches!(alice.send(&huge), Err(PadError::Codec(_))));
    assert_eq!(alice.status(), ConnectionStatus::Connected);

    alice.send("after").unwrap();
    let event = timeout(WAIT, bob_rx.recv()).await.unwrap().unwrap();
    assert_eq!(event.content(), "after");

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_relay_shutdown_disconnects_peers() {
    let relay = start_relay().await;
    let alice = join(&relay, "alice").await;
    timeout(WAIT, relay.wait_for_peers(1)).await.unwrap();

    relay.shutdown().await.unwrap();
    timeout(WAIT, alice.closed()).await.unwrap();

    assert_eq!(alice.status(), ConnectionStatus::Disconnected);
    assert!(alice.send("lost").unwrap_err().is_disconnect());
}
