//! Partition synchronization coordinator.
//!
//! For every partition the coordinator resolves the owners on the ring and
//! repairs each replica from the primary, one [`SyncSession`] per replica.
//! A session first compares cheap sketches, then walks the two Merkle trees
//! to find divergent leaf ranges, and finally rebuilds each range on the
//! replica from a rolling-checksum delta. Stores only expose whole-range
//! reads, so the delta bounds the bytes written, not the bytes read.
//!
//! Collaborator calls are bounded by `io_timeout_ms` and transient failures
//! are retried with exponential backoff. A session that runs out of retries
//! is suspended with its unreconciled ranges; the next sync of the partition
//! picks up from the first of them.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use corelib::hash::Digest;
use corelib::node::{Node, NodeId};
use corelib::partitioner::{Partitioner, Xxh3Partitioner};
use corelib::ring::HashRing;
use corelib::SyncConfig;
use dashmap::DashMap;
use delta::{apply_delta, compute_delta, Signature};
use merkle::KeyRange;
use metrics::{counter, histogram};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::checkpoint::{Checkpoint, SyncPoint};
use crate::codec::{decode_range, encode_range};
use crate::error::{Result, SyncError};
use crate::partition::{PartitionId, SyncPair};
use crate::session::{PartitionReport, SessionStats, SyncSession, SyncState};
use crate::store::{ReplicaDigest, ReplicaStore};
use crate::strategy::{ReplicationStrategy, SimpleStrategy};

/// Bytes moved by one range transfer.
struct RangeTransfer {
    literal_bytes: u64,
    copied_bytes: u64,
}

/// What the sketches say about a replica pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Estimate {
    /// No divergence; skip straight to done.
    Agree,
    /// Cardinalities are too far apart for localization to pay off.
    FarApart,
    Diverged,
}

pub struct SyncCoordinator<P: Partitioner = Xxh3Partitioner> {
    ring: Arc<HashRing<P>>,
    config: SyncConfig,
    strategy: Box<dyn ReplicationStrategy<P>>,
    stores: DashMap<NodeId, Arc<dyn ReplicaStore>>,
    suspended: DashMap<SyncPair, SyncSession>,
    roots: DashMap<PartitionId, Digest>,
    sync_points: DashMap<SyncPair, SyncPoint>,
}

impl<P: Partitioner> SyncCoordinator<P> {
    /// Coordinator over `ring` using [`SimpleStrategy`] with the configured
    /// replication factor.
    pub fn new(ring: Arc<HashRing<P>>, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ring,
            strategy: Box::new(SimpleStrategy::new(config.replication_factor)),
            config,
            stores: DashMap::new(),
            suspended: DashMap::new(),
            roots: DashMap::new(),
            sync_points: DashMap::new(),
        })
    }

    /// Rebuild the ring and sync history from a checkpoint. Stores must be
    /// registered again.
    pub fn from_checkpoint(
        partitioner: P,
        checkpoint: &Checkpoint,
        config: SyncConfig,
    ) -> Result<Self> {
        let ring = HashRing::from_membership(partitioner, &checkpoint.ring)?;
        let coordinator = Self::new(Arc::new(ring), config)?;
        for (partition, root) in &checkpoint.merkle_roots {
            coordinator.roots.insert(*partition, *root);
        }
        for (pair, point) in &checkpoint.sync_points {
            coordinator.sync_points.insert(*pair, point.clone());
        }
        Ok(coordinator)
    }

    pub fn with_strategy(mut self, strategy: impl ReplicationStrategy<P>) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn ring(&self) -> &Arc<HashRing<P>> {
        &self.ring
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Route sync traffic for `node` to `store`. Returns the store it replaces.
    pub fn register_store(
        &self,
        node: NodeId,
        store: Arc<dyn ReplicaStore>,
    ) -> Option<Arc<dyn ReplicaStore>> {
        self.stores.insert(node, store)
    }

    pub fn deregister_store(&self, node: &NodeId) -> Option<Arc<dyn ReplicaStore>> {
        self.stores.remove(node).map(|(_, store)| store)
    }

    /// Owners of `partition` on the current ring, primary first.
    pub fn owners(&self, partition: PartitionId) -> Result<Vec<Node>> {
        let snapshot = self.ring.snapshot();
        Ok(self.strategy.replicas_for_key(&snapshot, &partition.ring_key())?)
    }

    /// Root both sides agreed on when `partition` last converged.
    pub fn recorded_root(&self, partition: PartitionId) -> Option<Digest> {
        self.roots.get(&partition).map(|root| *root)
    }

    pub fn sync_point(&self, pair: &SyncPair) -> Option<SyncPoint> {
        self.sync_points.get(pair).map(|point| point.clone())
    }

    /// Ranges a suspended session of `partition` still has to transfer.
    pub fn suspended_ranges(&self, partition: PartitionId) -> Vec<KeyRange> {
        self.suspended
            .iter()
            .filter(|entry| entry.key().partition == partition)
            .flat_map(|entry| entry.value().pending().copied().collect::<Vec<_>>())
            .collect()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            ring: self.ring.membership(),
            merkle_roots: self.roots.iter().map(|e| (*e.key(), *e.value())).collect(),
            sync_points: self
                .sync_points
                .iter()
                .map(|e| (*e.key(), e.value().clone()))
                .collect(),
        }
    }

    /// Repair every replica of `partition` from its primary.
    ///
    /// Fails with the first session error after all sessions have run. Use
    /// [`SyncCoordinator::sync_partition_report`] to keep the outcome of the
    /// sessions that did converge.
    pub async fn sync_partition(&self, partition: PartitionId) -> Result<PartitionReport> {
        let report = self.sync_partition_report(partition).await?;
        match report.first_error() {
            Some(err) => Err(err.clone()),
            None => Ok(report),
        }
    }

    /// Repair every replica of `partition` from its primary, reporting
    /// failed sessions alongside converged ones.
    ///
    /// Sessions run one after another. A suspended session for the same
    /// pair is resumed instead of starting over. Only ring lookup errors
    /// fail the whole call.
    pub async fn sync_partition_report(&self, partition: PartitionId) -> Result<PartitionReport> {
        let owners = self.owners(partition)?;
        let Some((primary, replicas)) = owners.split_first() else {
            return Ok(PartitionReport {
                partition,
                sessions: Vec::new(),
            });
        };

        let pairs: Vec<SyncPair> = replicas
            .iter()
            .map(|replica| SyncPair {
                partition,
                source: primary.id,
                target: replica.id,
            })
            .collect();
        // Suspended work for pairs that no longer exist is stale.
        self.suspended
            .retain(|pair, _| pair.partition != partition || pairs.contains(pair));

        let mut sessions = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let mut session = match self.suspended.remove(&pair) {
                Some((_, session)) => {
                    info!(
                        %pair,
                        pending = session.pending.len(),
                        "resuming suspended sync session"
                    );
                    session
                }
                None => SyncSession::new(pair),
            };

            if let Err(err) = self.run_session(&mut session).await {
                counter!("partition_sync.failures").increment(1);
                warn!(%pair, error = %err, "sync session failed");
                if matches!(err, SyncError::RetriesExhausted { .. }) {
                    self.suspended.insert(pair, session.clone());
                }
            }
            sessions.push(session);
        }

        Ok(PartitionReport {
            partition,
            sessions,
        })
    }

    /// Sync independent partitions concurrently, one task each.
    pub async fn sync_partitions(
        self: &Arc<Self>,
        partitions: impl IntoIterator<Item = PartitionId>,
    ) -> BTreeMap<PartitionId, Result<PartitionReport>> {
        let mut tasks = JoinSet::new();
        for partition in partitions {
            let coordinator = Arc::clone(self);
            tasks.spawn(async move { (partition, coordinator.sync_partition(partition).await) });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((partition, result)) => {
                    results.insert(partition, result);
                }
                Err(err) => warn!(error = %err, "partition sync task did not complete"),
            }
        }
        results
    }

    async fn run_session(&self, session: &mut SyncSession) -> Result<()> {
        let pair = session.pair;
        let mut digests: Option<(ReplicaDigest, ReplicaDigest)> = None;

        if session.state == SyncState::Failed {
            session.error = None;
            let resume_at = if session.pending.is_empty() {
                SyncState::Idle
            } else {
                SyncState::Transferring
            };
            session.advance(resume_at);
        }

        loop {
            match session.state {
                SyncState::Idle => {
                    counter!("partition_sync.sessions").increment(1);
                    session.advance(SyncState::CheckingMembership);
                }
                SyncState::CheckingMembership => {
                    if let Err(err) = self.check_membership(&pair) {
                        return Err(session.fail(err));
                    }
                    session.advance(SyncState::Estimating);
                }
                SyncState::Estimating => {
                    let fetched = self.fetch_digests(&pair, &mut session.stats).await;
                    let (source, target) = match fetched {
                        Ok(fetched) => fetched,
                        Err(err) => return Err(session.fail(err)),
                    };
                    match self.estimate(&mut session.stats, &source, &target) {
                        Estimate::Agree => {
                            session.stats.short_circuited = true;
                            counter!("partition_sync.short_circuits").increment(1);
                            if source.root() == target.root() {
                                session.converged = Some(true);
                                self.record_sync_point(pair, source.root());
                            }
                            debug!(%pair, "replicas agree, nothing to transfer");
                            session.advance(SyncState::Done);
                        }
                        Estimate::FarApart => {
                            session.stats.full_transfer = true;
                            session.pending = [KeyRange::full()].into();
                            info!(
                                %pair,
                                source = session.stats.source_estimate,
                                target = session.stats.target_estimate,
                                "cardinalities far apart, transferring whole partition"
                            );
                            session.advance(SyncState::Transferring);
                        }
                        Estimate::Diverged => {
                            digests = Some((source, target));
                            session.advance(SyncState::Localizing);
                        }
                    }
                }
                SyncState::Localizing => {
                    let (source, target) = match digests.take() {
                        Some(fetched) => fetched,
                        None => match self.fetch_digests(&pair, &mut session.stats).await {
                            Ok(fetched) => fetched,
                            Err(err) => return Err(session.fail(err)),
                        },
                    };
                    let diff = if self.config.parallel_diff {
                        merkle::par_diff(&source.tree, &target.tree)
                    } else {
                        merkle::diff(&source.tree, &target.tree)
                    };
                    let diff = match diff {
                        Ok(diff) => diff,
                        Err(err) => return Err(session.fail(err.into())),
                    };

                    session.stats.comparisons += diff.comparisons;
                    session.stats.divergent_ranges = diff.ranges.len();
                    histogram!("partition_sync.divergent_ranges").record(diff.ranges.len() as f64);
                    info!(
                        %pair,
                        ranges = diff.ranges.len(),
                        comparisons = diff.comparisons,
                        "localized divergence"
                    );
                    session.pending = diff.ranges.into();
                    session.advance(SyncState::Transferring);
                }
                SyncState::Transferring => {
                    self.transfer_pending(session).await?;

                    let fetched = self.fetch_digests(&pair, &mut session.stats).await;
                    let (source, target) = match fetched {
                        Ok(fetched) => fetched,
                        Err(err) => return Err(session.fail(err)),
                    };
                    let converged = source.root() == target.root();
                    session.converged = Some(converged);
                    if converged {
                        self.record_sync_point(pair, source.root());
                    } else {
                        // Writes landed on either side while the session ran.
                        warn!(%pair, "roots still differ after transfer");
                    }
                    session.advance(SyncState::Done);
                }
                SyncState::Done => return Ok(()),
                SyncState::Failed => {
                    return Err(session
                        .error
                        .clone()
                        .unwrap_or(SyncError::StaleOwnership(pair)))
                }
            }
        }
    }

    fn check_membership(&self, pair: &SyncPair) -> Result<()> {
        let owners = self.owners(pair.partition)?;
        let primary_matches = owners.first().map(|node| node.id) == Some(pair.source);
        let target_owns = owners.iter().skip(1).any(|node| node.id == pair.target);
        if !primary_matches || !target_owns {
            return Err(SyncError::StaleOwnership(*pair));
        }
        self.store(&pair.source)?;
        self.store(&pair.target)?;
        Ok(())
    }

    fn estimate(
        &self,
        stats: &mut SessionStats,
        source: &ReplicaDigest,
        target: &ReplicaDigest,
    ) -> Estimate {
        let source_estimate = source.hll.estimate();
        let target_estimate = target.hll.estimate();
        let larger = source_estimate.max(target_estimate).max(1.0);
        let gap = (source_estimate - target_estimate).abs() / larger;

        let flagged = source
            .sample
            .iter()
            .filter(|key| !target.bloom.contains(key))
            .count()
            + target
                .sample
                .iter()
                .filter(|key| !source.bloom.contains(key))
                .count();

        stats.source_estimate = source_estimate;
        stats.target_estimate = target_estimate;
        stats.flagged_missing = flagged;

        // Equal key sets with edited values fool both sketches; the roots
        // catch that unless the caller opted out.
        let sketches_agree = gap <= self.config.hll_tolerance && flagged == 0;
        if sketches_agree && (self.config.trust_estimates || source.root() == target.root()) {
            Estimate::Agree
        } else if gap > self.config.full_transfer_ratio {
            Estimate::FarApart
        } else {
            Estimate::Diverged
        }
    }

    async fn transfer_pending(&self, session: &mut SyncSession) -> Result<()> {
        let pair = session.pair;
        let (source, target) = match (self.store(&pair.source), self.store(&pair.target)) {
            (Ok(source), Ok(target)) => (source, target),
            (Err(err), _) | (_, Err(err)) => return Err(session.fail(err)),
        };

        while let Some(range) = session.pending.front().copied() {
            let mut attempt = 0;
            let transfer = loop {
                let err = match self
                    .transfer_range(pair.partition, source.as_ref(), target.as_ref(), range)
                    .await
                {
                    Ok(transfer) => break transfer,
                    Err(err) => err,
                };
                if !err.is_retryable() {
                    return Err(session.fail(err));
                }
                if let Err(err) = self.backoff(&mut attempt, &mut session.stats, err).await {
                    let unreconciled: Vec<KeyRange> = session.pending.iter().copied().collect();
                    warn!(
                        %pair,
                        error = %err,
                        unreconciled = unreconciled.len(),
                        "retry budget exhausted"
                    );
                    return Err(session.fail(SyncError::RetriesExhausted {
                        partition: pair.partition,
                        target: pair.target,
                        unreconciled,
                    }));
                }
            };

            session.pending.pop_front();
            session.reconciled.push(range);
            session.stats.delta_invocations += 1;
            session.stats.literal_bytes += transfer.literal_bytes;
            session.stats.copied_bytes += transfer.copied_bytes;
        }
        Ok(())
    }

    /// Bring `range` on `target` in line with `source`.
    ///
    /// Both sides are read in full through `read_range`; the delta against
    /// the target's current content only shrinks what `write_range` is
    /// handed, not what is read from the source.
    async fn transfer_range(
        &self,
        partition: PartitionId,
        source: &dyn ReplicaStore,
        target: &dyn ReplicaStore,
        range: KeyRange,
    ) -> Result<RangeTransfer> {
        let base = self.timed(target.read_range(partition, &range)).await?;
        let fresh = self.timed(source.read_range(partition, &range)).await?;
        let base = encode_range(&base)?;
        let fresh = encode_range(&fresh)?;

        let signature = Signature::generate(&base, self.config.delta_block_size)?;
        let delta = compute_delta(&signature, &fresh);
        counter!("partition_sync.delta_invocations").increment(1);
        counter!("partition_sync.literal_bytes").increment(delta.literal_bytes());

        let content = decode_range(&apply_delta(&base, &delta)?)?;
        self.timed(target.write_range(partition, &range, content)).await?;

        debug!(
            %partition,
            %range,
            literal = delta.literal_bytes(),
            copied = delta.copied_bytes(),
            "range transferred"
        );
        Ok(RangeTransfer {
            literal_bytes: delta.literal_bytes(),
            copied_bytes: delta.copied_bytes(),
        })
    }

    async fn fetch_digests(
        &self,
        pair: &SyncPair,
        stats: &mut SessionStats,
    ) -> Result<(ReplicaDigest, ReplicaDigest)> {
        let source = self.store(&pair.source)?;
        let target = self.store(&pair.target)?;
        let source = self.fetch_digest(source.as_ref(), pair.partition, stats).await?;
        let target = self.fetch_digest(target.as_ref(), pair.partition, stats).await?;
        Ok((source, target))
    }

    async fn fetch_digest(
        &self,
        store: &dyn ReplicaStore,
        partition: PartitionId,
        stats: &mut SessionStats,
    ) -> Result<ReplicaDigest> {
        let mut attempt = 0;
        loop {
            match self.timed(store.digest(partition, &self.config)).await {
                Ok(digest) => return Ok(digest),
                Err(err) => self.backoff(&mut attempt, stats, err).await?,
            }
        }
    }

    /// Sleep before the next attempt, or hand `err` back once it is not
    /// retryable or the budget is spent.
    async fn backoff(
        &self,
        attempt: &mut u32,
        stats: &mut SessionStats,
        err: SyncError,
    ) -> Result<()> {
        if !err.is_retryable() || *attempt >= self.config.max_retries {
            return Err(err);
        }
        *attempt += 1;
        stats.retries += 1;
        counter!("partition_sync.transport_retries").increment(1);

        let delay = Duration::from_millis(
            self.config
                .retry_backoff_ms
                .saturating_mul(1 << (*attempt - 1).min(10)),
        );
        warn!(attempt = *attempt, ?delay, error = %err, "collaborator call failed, retrying");
        tokio::time::sleep(delay).await;
        Ok(())
    }

    async fn timed<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let deadline = Duration::from_millis(self.config.io_timeout_ms);
        tokio::time::timeout(deadline, call)
            .await
            .map_err(|_| SyncError::Timeout(deadline))?
    }

    fn store(&self, node: &NodeId) -> Result<Arc<dyn ReplicaStore>> {
        self.stores
            .get(node)
            .map(|store| Arc::clone(store.value()))
            .ok_or(SyncError::UnknownStore(*node))
    }

    fn record_sync_point(&self, pair: SyncPair, root: Digest) {
        let completed_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        self.roots.insert(pair.partition, root);
        self.sync_points.insert(
            pair,
            SyncPoint {
                source_root: root,
                ring_version: self.ring.snapshot().version(),
                completed_at_ms,
            },
        );
    }
}

impl<P: Partitioner> std::fmt::Debug for SyncCoordinator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("ring", &self.ring)
            .field("strategy", &self.strategy.name())
            .field("stores", &self.stores.len())
            .field("suspended", &self.suspended.len())
            .finish()
    }
}
