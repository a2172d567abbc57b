// Two-participant rendezvous demo.
//
// Bob runs a small script in the background: wait for a "start" identifier,
// then publish an opaque payload. Alice delivers the signal, then the two
// exchange a direct message outside any script.
//
// Run with: cargo run --example two_party

use std::sync::Arc;
use std::time::Duration;

use chorale::{choice, put, ChoiceElement, Participant, ParticipantConfig, Prefix, RecordingPublisher};
use tokio::time::sleep;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chorale=debug".into()),
        )
        .init();

    let recorder = RecordingPublisher::new();
    let bob = ParticipantConfig::new("bob")
        .bind_with(Arc::new(recorder.clone()))
        .await?;
    let alice = Participant::bind("alice").await?;
    println!("bob listening on {}, alice on {}", bob.port(), alice.port());

    // Bob waits for the go signal in the background. The fallback branch is
    // unreachable: the ask ahead of it blocks until "start" arrives.
    let script = choice(vec![
        ChoiceElement::then(Prefix::ask(["start"]), put("order-signed")),
        ChoiceElement::then(Prefix::check(|| true), put("order-aborted")),
    ]);
    bob.parallel([script]).await?;

    // Returns only once Bob's script has consumed the signal.
    alice.send("start", ("127.0.0.1", bob.port())).await?;
    println!("alice: start delivered");

    while recorder.payloads().is_empty() {
        sleep(Duration::from_millis(10)).await;
    }
    println!("bob published: {:?}", recorder.payloads());

    // A direct exchange outside any script; the integer arrives as text.
    let reply = tokio::spawn({
        let alice = alice.clone();
        async move { alice.receive().await }
    });
    bob.send(42, ("127.0.0.1", alice.port())).await?;
    println!("alice received: {:?}", reply.await??);

    alice.stop().await;
    bob.stop().await;
    Ok(())
}
