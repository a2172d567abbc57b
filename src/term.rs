//! Process-algebra terms for choreography scripts.
//!
//! A script compiles (elsewhere) into a tree of [`Process`] terms: a
//! [`Choice`] over guarded alternatives, each pairing a [`Prefix`] action
//! with a continuation. The runtime executes these terms; it never inspects
//! what the carried strings mean.

use std::fmt;
use std::sync::Arc;

/// A caller-supplied zero-argument condition, evaluated by `Check` guards.
///
/// The runtime treats the predicate as opaque: it may block, and whether it
/// does is the caller's responsibility.
pub type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// An atomic guarded action.
#[derive(Clone)]
pub enum Prefix {
    /// Wait for an inbound message whose payload equals one of the expected
    /// identifiers. A received message that matches nothing is discarded and
    /// the guard fails.
    Ask(Vec<String>),
    /// Evaluate a local condition.
    Check(Predicate),
    /// Publish an opaque payload. Trivially satisfied; the publish happens
    /// at commitment.
    Put(String),
}

impl Prefix {
    /// An `Ask` over a set of accepted identifiers.
    pub fn ask<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Prefix::Ask(identifiers.into_iter().map(Into::into).collect())
    }

    /// A `Check` of a local condition.
    pub fn check<F>(condition: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Prefix::Check(Arc::new(condition))
    }

    /// A `Put` of an opaque payload.
    pub fn put(payload: impl Into<String>) -> Self {
        Prefix::Put(payload.into())
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Ask(identifiers) => f.debug_tuple("Ask").field(identifiers).finish(),
            Prefix::Check(_) => f.debug_tuple("Check").field(&"<predicate>").finish(),
            Prefix::Put(payload) => f.debug_tuple("Put").field(payload).finish(),
        }
    }
}

/// One alternative of a [`Choice`]: a prefix and the process to run after
/// the prefix commits.
#[derive(Debug, Clone)]
pub struct ChoiceElement {
    prefix: Prefix,
    continuation: Process,
}

impl ChoiceElement {
    /// An alternative with no continuation.
    pub fn new(prefix: Prefix) -> Self {
        Self {
            prefix,
            continuation: Process::Done,
        }
    }

    /// An alternative that continues into `continuation` once committed.
    pub fn then(prefix: Prefix, continuation: Process) -> Self {
        Self {
            prefix,
            continuation,
        }
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn continuation(&self) -> &Process {
        &self.continuation
    }
}

/// An ordered set of guarded alternatives. Evaluation commits to the first
/// alternative whose guard is satisfied.
#[derive(Debug, Clone)]
pub struct Choice {
    elements: Vec<ChoiceElement>,
}

impl Choice {
    /// Build a choice from its alternatives.
    ///
    /// # Panics
    ///
    /// Panics if `elements` is empty. An empty choice has no alternative to
    /// commit to and cannot exist.
    pub fn new(elements: Vec<ChoiceElement>) -> Self {
        assert!(
            !elements.is_empty(),
            "a choice needs at least one alternative"
        );
        Self { elements }
    }

    pub fn elements(&self) -> &[ChoiceElement] {
        &self.elements
    }
}

/// A node in a process term tree: either a choice over guarded alternatives
/// or the terminated process.
///
/// Terms are tree-shaped and immutable once built; they are safe to read
/// concurrently and cheap to clone (predicates clone by reference count).
#[derive(Debug, Clone)]
pub enum Process {
    Choice(Choice),
    Done,
}

/// Build a choice process from its alternatives. Panics if `elements` is
/// empty, like [`Choice::new`].
pub fn choice(elements: Vec<ChoiceElement>) -> Process {
    Process::Choice(Choice::new(elements))
}

/// A single-alternative process waiting for one of the expected identifiers.
pub fn ask<I, S>(identifiers: I) -> Process
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    choice(vec![ChoiceElement::new(Prefix::ask(identifiers))])
}

/// A single-alternative process gated on a local condition.
pub fn check<F>(condition: F) -> Process
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    choice(vec![ChoiceElement::new(Prefix::check(condition))])
}

/// A single-alternative process publishing a payload.
pub fn put(payload: impl Into<String>) -> Process {
    choice(vec![ChoiceElement::new(Prefix::put(payload))])
}
