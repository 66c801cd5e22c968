//! Random edits on either replica always sync back to the primary's content.

use std::sync::Arc;

use corelib::node::{Node, NodeId};
use corelib::ring::HashRing;
use corelib::SyncConfig;
use proptest::prelude::*;
use replication::{MemoryStore, PartitionId, SyncCoordinator};

#[derive(Debug, Clone)]
enum Edit {
    Put { primary: bool, key: usize, value: u32 },
    Delete { primary: bool, key: usize },
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (any::<bool>(), 0usize..600, any::<u32>())
            .prop_map(|(primary, key, value)| Edit::Put { primary, key, value }),
        (any::<bool>(), 0usize..600).prop_map(|(primary, key)| Edit::Delete { primary, key }),
    ]
}

fn key(i: usize) -> String {
    format!("key-{i:04}")
}

fn coordinator() -> SyncCoordinator {
    let ring = HashRing::with_vnodes(32);
    for id in 1..=2 {
        ring.add_node(Node::new(NodeId(id), format!("node{id}")), 1).unwrap();
    }
    let config = SyncConfig {
        replication_factor: 2,
        retry_backoff_ms: 1,
        ..SyncConfig::default()
    };
    SyncCoordinator::new(Arc::new(ring), config).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn sync_converges_after_random_edits(edits in prop::collection::vec(edit(), 0..40)) {
        let coordinator = coordinator();
        let partition = PartitionId(3);
        let primary = Arc::new(MemoryStore::new());
        let replica = Arc::new(MemoryStore::new());
        for i in 0..500 {
            primary.put(partition, key(i), format!("value-{i}"));
            replica.put(partition, key(i), format!("value-{i}"));
        }
        for edit in &edits {
            match edit {
                Edit::Put { primary: on_primary, key: i, value } => {
                    let store = if *on_primary { &primary } else { &replica };
                    store.put(partition, key(*i), value.to_string());
                }
                Edit::Delete { primary: on_primary, key: i } => {
                    let store = if *on_primary { &primary } else { &replica };
                    store.delete(partition, key(*i).as_bytes());
                }
            }
        }

        let owners = coordinator.owners(partition).unwrap();
        coordinator.register_store(owners[0].id, primary.clone());
        coordinator.register_store(owners[1].id, replica.clone());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let report = runtime.block_on(coordinator.sync_partition(partition)).unwrap();

        prop_assert!(report.is_converged());
        prop_assert_eq!(report.sessions[0].converged(), Some(true));
        prop_assert_eq!(primary.entries(partition), replica.entries(partition));
    }
}
