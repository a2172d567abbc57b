// Rendezvous and lifecycle properties of the network layer: ports valid at
// construction, sends blocked until consumption, concurrent sends
// serialized, shutdown bounded and port-releasing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use tokio::time::{sleep, timeout};

use chorale::{put, Participant, ParticipantConfig, RecordingPublisher, RuntimeError};

async fn bind(name: &str) -> Result<Participant> {
    Ok(ParticipantConfig::new(name)
        .with_shutdown_timeout(Duration::from_millis(500))
        .bind()
        .await?)
}

#[tokio::test]
async fn port_is_bound_the_moment_construction_returns() -> Result<()> {
    let participant = bind("early-bird").await?;
    let port = participant.port();
    assert_ne!(port, 0);

    // The port accepts connections immediately, with no warm-up window.
    let probe = tokio::net::TcpStream::connect(("127.0.0.1", port)).await;
    assert!(probe.is_ok());
    drop(probe);

    participant.stop().await;
    Ok(())
}

#[tokio::test]
async fn round_trip_delivers_the_payload_exactly_once() -> Result<()> {
    let alice = bind("alice").await?;
    let bob = bind("bob").await?;
    let bob_addr = ("127.0.0.1", bob.port());

    let delivery = tokio::spawn({
        let alice = alice.clone();
        async move { alice.send("tx-id-0001", bob_addr).await }
    });

    assert_eq!(bob.receive().await?, "tx-id-0001");
    delivery.await??;

    // Consumed once; the channel is empty again.
    assert!(timeout(Duration::from_millis(100), bob.receive()).await.is_err());

    alice.stop().await;
    bob.stop().await;
    Ok(())
}

#[tokio::test]
async fn send_does_not_return_before_the_receiver_consumes() -> Result<()> {
    let alice = bind("alice").await?;
    let bob = bind("bob").await?;
    let bob_addr = ("127.0.0.1", bob.port());

    let delivery = tokio::spawn({
        let alice = alice.clone();
        async move { alice.send("held", bob_addr).await }
    });

    // The message is buffered but unconsumed: the sender must still be
    // blocked in its handshake.
    sleep(Duration::from_millis(300)).await;
    assert!(!delivery.is_finished());

    assert_eq!(bob.receive().await?, "held");
    delivery.await??;

    alice.stop().await;
    bob.stop().await;
    Ok(())
}

#[tokio::test]
async fn concurrent_sends_to_one_participant_are_serialized() -> Result<()> {
    let alice = bind("alice").await?;
    let carol = bind("carol").await?;
    let bob = bind("bob").await?;
    let bob_addr = ("127.0.0.1", bob.port());

    let first = tokio::spawn({
        let alice = alice.clone();
        async move { alice.send("from-alice", bob_addr).await }
    });
    let second = tokio::spawn({
        let carol = carol.clone();
        async move { carol.send("from-carol", bob_addr).await }
    });

    // Neither handshake can complete while nothing is consumed.
    sleep(Duration::from_millis(300)).await;
    assert!(!first.is_finished());
    assert!(!second.is_finished());

    let mut seen = vec![bob.receive().await?, bob.receive().await?];
    seen.sort();
    assert_eq!(seen, vec!["from-alice", "from-carol"]);

    first.await??;
    second.await??;

    alice.stop().await;
    carol.stop().await;
    bob.stop().await;
    Ok(())
}

#[tokio::test]
async fn integer_payload_arrives_as_literal_text() -> Result<()> {
    let alice = bind("alice").await?;
    let bob = bind("bob").await?;
    let bob_addr = ("127.0.0.1", bob.port());

    let delivery = tokio::spawn({
        let alice = alice.clone();
        async move { alice.send(42, bob_addr).await }
    });

    assert_eq!(bob.receive().await?, "42");
    delivery.await??;

    alice.stop().await;
    bob.stop().await;
    Ok(())
}

#[tokio::test]
async fn payload_is_trimmed_on_send_but_inner_whitespace_survives() -> Result<()> {
    let alice = bind("alice").await?;
    let bob = bind("bob").await?;
    let bob_addr = ("127.0.0.1", bob.port());

    let delivery = tokio::spawn({
        let alice = alice.clone();
        async move { alice.send("  spaced  out  ", bob_addr).await }
    });

    assert_eq!(bob.receive().await?, "spaced  out");
    delivery.await??;

    alice.stop().await;
    bob.stop().await;
    Ok(())
}

#[tokio::test]
async fn send_to_an_offline_peer_fails_fast() -> Result<()> {
    let alice = bind("alice").await?;

    // Nobody is bound there; the failure surfaces immediately, no retry.
    let outcome = alice.send("hello", "127.0.0.1:1").await;
    assert!(matches!(outcome, Err(RuntimeError::Transport { .. })));

    alice.stop().await;
    Ok(())
}

#[tokio::test]
async fn stop_is_bounded_releases_the_port_and_refuses_work() -> Result<()> {
    let participant = bind("leaver").await?;
    let port = participant.port();

    // No pending work: stop comes back well within the drain deadline.
    timeout(Duration::from_secs(5), participant.stop()).await?;

    // The port is free again.
    let rebound = tokio::net::TcpListener::bind(("0.0.0.0", port)).await;
    assert!(rebound.is_ok());

    // And new work is refused rather than silently dropped.
    let refused = participant.parallel([put("late")]).await;
    assert!(matches!(refused, Err(RuntimeError::ShuttingDown)));
    Ok(())
}

#[tokio::test]
async fn parallel_branches_run_without_blocking_each_other() -> Result<()> {
    let publisher = RecordingPublisher::new();
    let bob = ParticipantConfig::new("bob")
        .with_shutdown_timeout(Duration::from_millis(500))
        .bind_with(Arc::new(publisher.clone()))
        .await?;
    let alice = bind("alice").await?;
    let bob_addr = ("127.0.0.1", bob.port());

    // Branch 0 blocks on an ask; branch 1 publishes right away. If the pool
    // ran branches one at a time, the second could never fire.
    bob.parallel([chorale::ask(["go"]), put("unblocked")]).await?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while publisher.payloads().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "second branch never ran");
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(publisher.payloads(), vec!["unblocked"]);

    // Release the blocked branch and let both drain.
    alice.send("go", bob_addr).await?;

    alice.stop().await;
    bob.stop().await;
    Ok(())
}

#[tokio::test]
async fn many_sends_arrive_in_some_order_each_exactly_once() -> Result<()> {
    let bob = bind("bob").await?;
    let bob_addr = ("127.0.0.1", bob.port());

    let senders: Vec<_> = (0..5)
        .map(|i| {
            tokio::spawn(async move {
                let sender = Participant::bind(format!("sender-{i}")).await?;
                sender.send(format!("msg-{i}"), bob_addr).await?;
                sender.stop().await;
                Ok::<_, RuntimeError>(())
            })
        })
        .collect();

    let mut seen = Vec::new();
    for _ in 0..5 {
        seen.push(bob.receive().await?);
    }
    seen.sort();
    assert_eq!(seen, vec!["msg-0", "msg-1", "msg-2", "msg-3", "msg-4"]);

    for outcome in join_all(senders).await {
        outcome??;
    }

    bob.stop().await;
    Ok(())
}
