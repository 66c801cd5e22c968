//! Per-pair sync session state.

use std::collections::VecDeque;
use std::fmt;

use corelib::node::NodeId;
use merkle::KeyRange;
use tracing::debug;

use crate::error::SyncError;
use crate::partition::{PartitionId, SyncPair};

/// Stages of one replica repair.
///
/// ```text
/// Idle -> CheckingMembership -> Estimating -> Localizing -> Transferring -> Done
///                                   |                                        ^
///                                   +------------- short circuit ------------+
/// ```
///
/// `Failed` is reachable from every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Idle,
    CheckingMembership,
    Estimating,
    Localizing,
    Transferring,
    Done,
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::CheckingMembership => "checking-membership",
            SyncState::Estimating => "estimating",
            SyncState::Localizing => "localizing",
            SyncState::Transferring => "transferring",
            SyncState::Done => "done",
            SyncState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub source_estimate: f64,
    pub target_estimate: f64,
    /// Sampled keys one side has and the other's Bloom filter rejects.
    pub flagged_missing: usize,
    pub short_circuited: bool,
    pub full_transfer: bool,
    /// Merkle node pairs compared while localizing.
    pub comparisons: usize,
    pub divergent_ranges: usize,
    pub delta_invocations: usize,
    pub literal_bytes: u64,
    pub copied_bytes: u64,
    pub retries: u32,
}

/// Repair of `target` from `source` for one partition.
///
/// Ranges move from `pending` to `reconciled` as they are transferred; a
/// failed session keeps its pending ranges so it can resume from them.
#[derive(Debug, Clone)]
pub struct SyncSession {
    pub(crate) pair: SyncPair,
    pub(crate) state: SyncState,
    pub(crate) history: Vec<SyncState>,
    pub(crate) pending: VecDeque<KeyRange>,
    pub(crate) reconciled: Vec<KeyRange>,
    pub(crate) stats: SessionStats,
    pub(crate) converged: Option<bool>,
    pub(crate) error: Option<SyncError>,
}

impl SyncSession {
    pub fn new(pair: SyncPair) -> Self {
        Self {
            pair,
            state: SyncState::Idle,
            history: vec![SyncState::Idle],
            pending: VecDeque::new(),
            reconciled: Vec::new(),
            stats: SessionStats::default(),
            converged: None,
            error: None,
        }
    }

    pub(crate) fn advance(&mut self, next: SyncState) {
        debug!(pair = %self.pair, from = %self.state, to = %next, "sync state transition");
        self.state = next;
        self.history.push(next);
    }

    pub(crate) fn fail(&mut self, error: SyncError) -> SyncError {
        self.advance(SyncState::Failed);
        self.error = Some(error.clone());
        error
    }

    pub fn pair(&self) -> SyncPair {
        self.pair
    }

    pub fn partition(&self) -> PartitionId {
        self.pair.partition
    }

    pub fn source(&self) -> NodeId {
        self.pair.source
    }

    pub fn target(&self) -> NodeId {
        self.pair.target
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Every state entered, in order.
    pub fn history(&self) -> &[SyncState] {
        &self.history
    }

    /// Ranges still divergent, in transfer order.
    pub fn pending(&self) -> impl Iterator<Item = &KeyRange> {
        self.pending.iter()
    }

    pub fn reconciled(&self) -> &[KeyRange] {
        &self.reconciled
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Whether both roots matched after transfer. `None` until checked.
    pub fn converged(&self) -> Option<bool> {
        self.converged
    }

    pub fn error(&self) -> Option<&SyncError> {
        self.error.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.state == SyncState::Done
    }
}

/// Outcome of syncing every replica of one partition.
#[derive(Debug, Clone)]
pub struct PartitionReport {
    pub partition: PartitionId,
    pub sessions: Vec<SyncSession>,
}

impl PartitionReport {
    pub fn is_converged(&self) -> bool {
        self.sessions
            .iter()
            .all(|s| s.is_done() && s.converged != Some(false))
    }

    /// Sessions that failed, with their errors, in owner order.
    pub fn failures(&self) -> impl Iterator<Item = (SyncPair, &SyncError)> {
        self.sessions
            .iter()
            .filter_map(|s| s.error.as_ref().map(|err| (s.pair, err)))
    }

    pub fn first_error(&self) -> Option<&SyncError> {
        self.failures().next().map(|(_, err)| err)
    }

    /// Replicas whose root matched the primary's when their session ended.
    pub fn converged_targets(&self) -> Vec<NodeId> {
        self.sessions
            .iter()
            .filter(|s| s.is_done() && s.converged == Some(true))
            .map(|s| s.pair.target)
            .collect()
    }

    pub fn delta_invocations(&self) -> usize {
        self.sessions.iter().map(|s| s.stats.delta_invocations).sum()
    }

    pub fn literal_bytes(&self) -> u64 {
        self.sessions.iter().map(|s| s.stats.literal_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_records_transitions() {
        let mut session = SyncSession::new(SyncPair {
            partition: PartitionId(1),
            source: NodeId(1),
            target: NodeId(2),
        });
        session.advance(SyncState::CheckingMembership);
        let err = session.fail(SyncError::Transport("down".into()));

        assert_eq!(session.state(), SyncState::Failed);
        assert_eq!(
            session.history(),
            &[SyncState::Idle, SyncState::CheckingMembership, SyncState::Failed]
        );
        assert_eq!(session.error(), Some(&err));
        assert!(!session.is_done());
    }
}
