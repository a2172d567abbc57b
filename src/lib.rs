//! Chorale: a concurrent runtime for multi-party choreography scripts.
//!
//! Each participant in a distributed protocol runs a process-algebra term
//! (guarded choice, sequencing, parallel composition) and synchronizes with
//! its peers through one-line messages over point-to-point TCP. The runtime
//! executes the terms; it attaches no meaning to the strings they carry.
//! Building payloads and compiling scripts into terms belong to external
//! collaborators.
//!
//! The synchronization primitive is a rendezvous handshake: a sender writes
//! one line and blocks until the receiver's listener closes the connection,
//! which it does only after a reader has consumed the message. That gives
//! every delivered message exactly-once consumption and keeps two sides of
//! a protocol step in lockstep without explicit acknowledgment messages.
//!
//! ```no_run
//! use chorale::{choice, put, ChoiceElement, Participant, Prefix};
//!
//! # async fn demo() -> chorale::Result<()> {
//! let bob = Participant::bind("bob").await?;
//!
//! // Wait for a "ready" identifier, then publish "go"; a local condition
//! // guards the fallback branch.
//! let script = choice(vec![
//!     ChoiceElement::then(Prefix::ask(["ready"]), put("go")),
//!     ChoiceElement::then(Prefix::check(|| false), put("fallback")),
//! ]);
//! bob.run(script).await?;
//! bob.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod participant;
pub mod publish;
pub mod term;

mod daemon;
mod pool;

pub use config::ParticipantConfig;
pub use error::{Result, RuntimeError};
pub use participant::Participant;
pub use publish::{LogPublisher, Publisher, RecordingPublisher};
pub use term::{ask, check, choice, put, Choice, ChoiceElement, Predicate, Prefix, Process};
