//! Steps and the actions they hand back to the engine
//!
//! A step is one node of a chain. Its static `next` link is fixed at
//! construction; [`Step::apply`] decides at run time whether the engine
//! follows that link, jumps elsewhere, parks the chain on an external call,
//! or ends it.

use crate::error::Result;
use crate::packet::Packet;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Shared handle to a step
pub type StepRef = Arc<dyn Step>;

/// One node of a step chain
pub trait Step: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// The node the engine advances to on [`NextAction::Continue`]
    fn next(&self) -> Option<StepRef>;

    /// Run this step against the chain's packet.
    ///
    /// Returning `Err` ends the chain as failed.
    fn apply(&self, packet: &mut Packet) -> Result<NextAction>;
}

/// What the engine does after a step has been applied
pub enum NextAction {
    /// Advance to the current step's `next`, or complete the chain if there is none
    Continue,
    /// Jump to the given step
    Goto(StepRef),
    /// Park the chain until the external call completes
    Suspend(Suspension),
    /// End the chain; nothing further runs
    Terminate,
}

impl NextAction {
    pub fn goto(step: StepRef) -> Self {
        NextAction::Goto(step)
    }

    /// Continue to `step` when present, otherwise complete like [`NextAction::Continue`]
    /// would for a step without a successor.
    pub fn goto_or_continue(step: Option<StepRef>) -> Self {
        match step {
            Some(step) => NextAction::Goto(step),
            None => NextAction::Continue,
        }
    }

    pub fn suspend<F>(future: F) -> Self
    where
        F: Future<Output = Resumption> + Send + 'static,
    {
        NextAction::Suspend(Suspension::new(future))
    }
}

impl fmt::Debug for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextAction::Continue => write!(f, "Continue"),
            NextAction::Goto(step) => write!(f, "Goto({})", step.name()),
            NextAction::Suspend(_) => write!(f, "Suspend"),
            NextAction::Terminate => write!(f, "Terminate"),
        }
    }
}

/// A parked chain waiting on an external call
pub struct Suspension {
    future: BoxFuture<'static, Resumption>,
}

impl Suspension {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Resumption> + Send + 'static,
    {
        Self {
            future: future.boxed(),
        }
    }

    pub(crate) fn into_future(self) -> BoxFuture<'static, Resumption> {
        self.future
    }
}

type Resume = Box<dyn FnOnce(&mut Packet) -> Result<NextAction> + Send>;

/// The continuation of a suspended chain
///
/// Consumed by the engine, so it runs exactly once.
pub struct Resumption {
    next: Option<StepRef>,
    resume: Resume,
}

impl Resumption {
    /// `next` is where [`NextAction::Continue`] returned by `resume` leads.
    pub fn new<F>(next: Option<StepRef>, resume: F) -> Self
    where
        F: FnOnce(&mut Packet) -> Result<NextAction> + Send + 'static,
    {
        Self {
            next,
            resume: Box::new(resume),
        }
    }

    /// Resume straight into `next`.
    pub fn proceed(next: Option<StepRef>) -> Self {
        Self::new(next, |_| Ok(NextAction::Continue))
    }

    pub(crate) fn into_parts(self) -> (Option<StepRef>, Resume) {
        (self.next, self.resume)
    }
}
