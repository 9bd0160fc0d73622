//! Rolling batch of pending managed-server cycles
//!
//! Managed pod steps that decide to cycle do not replace the Pod inline.
//! They park a `(cycle step, packet)` pair here keyed by server name, and
//! [`RollServersStep`] drains the batch once every managed server of the
//! pass has been examined.

use operator_work::{fork_join, NextAction, Packet, Result, Step, StepAndPacket, StepRef};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};

/// Pending cycles for one scheduling pass, at most one per server
#[derive(Debug, Default)]
pub struct RollingBatch {
    pending: Mutex<HashMap<String, StepAndPacket>>,
}

impl RollingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a cycle for `server_name`. A later entry for the same server
    /// supersedes the earlier one, which is returned.
    pub fn insert(&self, server_name: &str, entry: StepAndPacket) -> Option<StepAndPacket> {
        let previous = self.pending.lock().insert(server_name.to_string(), entry);
        if previous.is_some() {
            debug!(server = %server_name, "Superseded pending cycle");
        }
        previous
    }

    /// Take every pending cycle, ordered by server name.
    pub fn drain(&self) -> Vec<(String, StepAndPacket)> {
        let mut entries: Vec<_> = self.pending.lock().drain().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pending.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, server_name: &str) -> bool {
        self.pending.lock().contains_key(server_name)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// Runs every cycle queued in the packet's [`RollingBatch`]
///
/// At most `max_concurrency` cycles are in flight at once. Continues to
/// `next` when every cycle has finished, whatever their outcome.
pub struct RollServersStep {
    batch_key: &'static str,
    max_concurrency: usize,
    next: Option<StepRef>,
}

impl RollServersStep {
    pub fn new(max_concurrency: usize, next: Option<StepRef>) -> Self {
        Self {
            batch_key: crate::keys::SERVERS_TO_ROLL,
            max_concurrency: max_concurrency.max(1),
            next,
        }
    }
}

impl Step for RollServersStep {
    fn name(&self) -> &str {
        "roll-servers"
    }

    fn next(&self) -> Option<StepRef> {
        self.next.clone()
    }

    fn apply(&self, packet: &mut Packet) -> Result<NextAction> {
        let Some(batch) = packet.get::<RollingBatch>(self.batch_key) else {
            return Ok(NextAction::Continue);
        };

        let entries = batch.drain();
        if entries.is_empty() {
            return Ok(NextAction::Continue);
        }

        info!(
            servers = ?entries.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            max_concurrency = self.max_concurrency,
            "Rolling servers"
        );

        let chains = entries.into_iter().map(|(_, entry)| entry).collect();
        Ok(fork_join(chains, self.max_concurrency, self.next.clone()))
    }
}
