//! Fiber engine
//!
//! A fiber drives one chain: it applies the current step, interprets the
//! returned [`NextAction`], and repeats until the chain completes, terminates
//! or fails. Suspension points are the only places a fiber yields. The engine
//! never re-applies a step on its own.

use crate::error::Result;
use crate::packet::Packet;
use crate::step::{NextAction, Resumption, StepRef};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

static FIBER_IDS: AtomicU64 = AtomicU64::new(1);

/// How a fiber ended
#[derive(Debug)]
pub enum FiberOutcome {
    /// Ran off the end of the chain
    Completed(Packet),
    /// A step returned [`NextAction::Terminate`]
    Terminated(Packet),
}

impl FiberOutcome {
    pub fn packet(&self) -> &Packet {
        match self {
            FiberOutcome::Completed(packet) | FiberOutcome::Terminated(packet) => packet,
        }
    }

    pub fn into_packet(self) -> Packet {
        match self {
            FiberOutcome::Completed(packet) | FiberOutcome::Terminated(packet) => packet,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, FiberOutcome::Terminated(_))
    }
}

/// A forked sub-chain and the packet it runs with
#[derive(Clone)]
pub struct StepAndPacket {
    pub step: StepRef,
    pub packet: Packet,
}

impl StepAndPacket {
    pub fn new(step: StepRef, packet: Packet) -> Self {
        Self { step, packet }
    }
}

impl fmt::Debug for StepAndPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepAndPacket")
            .field("step", &self.step.name())
            .field("packet", &self.packet)
            .finish()
    }
}

/// Run a chain to its end on the current task.
pub async fn run(step: StepRef, mut packet: Packet) -> Result<FiberOutcome> {
    let fiber = FIBER_IDS.fetch_add(1, Ordering::Relaxed);
    debug!(fiber, first_step = step.name(), "Fiber started");

    let mut current = Some(step);
    while let Some(step) = current.take() {
        trace!(fiber, step = step.name(), "Applying step");
        let mut anchor = step.next();
        let mut action = step.apply(&mut packet)?;

        loop {
            match action {
                NextAction::Continue => {
                    current = anchor;
                    break;
                }
                NextAction::Goto(target) => {
                    current = Some(target);
                    break;
                }
                NextAction::Terminate => {
                    debug!(fiber, step = step.name(), "Fiber terminated");
                    return Ok(FiberOutcome::Terminated(packet));
                }
                NextAction::Suspend(suspension) => {
                    trace!(fiber, step = step.name(), "Fiber suspended");
                    let resumption = suspension.into_future().await;
                    let (next, resume) = resumption.into_parts();
                    anchor = next;
                    action = resume(&mut packet)?;
                }
            }
        }
    }

    debug!(fiber, "Fiber completed");
    Ok(FiberOutcome::Completed(packet))
}

/// Run a chain on its own tokio task.
pub fn spawn(step: StepRef, packet: Packet) -> JoinHandle<Result<FiberOutcome>> {
    tokio::spawn(run(step, packet))
}

/// Run independent sub-chains with at most `max_concurrency` in flight.
///
/// Results come back in completion order. A failing sub-chain does not
/// affect the others.
pub async fn run_all(
    chains: Vec<StepAndPacket>,
    max_concurrency: usize,
) -> Vec<Result<FiberOutcome>> {
    stream::iter(chains)
        .map(|chain| run(chain.step, chain.packet))
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await
}

/// Park the current chain while `chains` run, then continue to `next`.
///
/// Sub-chain failures are logged and do not fail the parent.
pub fn fork_join(
    chains: Vec<StepAndPacket>,
    max_concurrency: usize,
    next: Option<StepRef>,
) -> NextAction {
    if chains.is_empty() {
        return NextAction::goto_or_continue(next);
    }

    NextAction::suspend(async move {
        let count = chains.len();
        let results = run_all(chains, max_concurrency).await;
        let failed = results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .inspect(|e| warn!(error = %e, "Forked fiber failed"))
            .count();
        debug!(count, failed, "Forked fibers joined");
        Resumption::proceed(next)
    })
}
