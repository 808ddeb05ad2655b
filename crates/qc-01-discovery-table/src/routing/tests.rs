//! Tests for the routing-set strategies

use std::cmp::Ordering;
use std::sync::Arc;

use super::bucketed::bucket_index;
use super::*;
use crate::adapters::MemoryNodeStore;
use crate::domain::{dist_cmp, log_dist, TableConfig, Timestamp};
use crate::test_utils::{
    make_node, make_public_node, ControllableTimeSource, MockTransport,
};

fn local_node(role: NodeRole) -> Node {
    make_node(u16::MAX, role)
}

fn test_core(local: NodeRole, transport: Arc<MockTransport>) -> Arc<TableCore> {
    let (core, _refresh_rx) = TableCore::new(
        local_node(local),
        TableConfig::for_testing(),
        transport,
        Arc::new(MemoryNodeStore::new()),
        Arc::new(ControllableTimeSource::new(1000)),
        Vec::new(),
    );
    core
}

fn ids(nodes: &[Node]) -> Vec<NodeId> {
    nodes.iter().map(|n| n.id).collect()
}

/// Endpoint nodes that fall into bucket `ix` relative to the local node.
fn nodes_in_bucket(ix: usize, count: usize) -> Vec<Node> {
    let self_key = local_node(NodeRole::Endpoint).id.key();
    (1..u16::MAX)
        .map(|val| make_node(val, NodeRole::Endpoint))
        .filter(|n| bucket_index(log_dist(&self_key, n.key())) == ix)
        .take(count)
        .collect()
}

// ============================================================================
// FlatStorage
// ============================================================================

#[test]
fn test_flat_capacity_is_never_exceeded() {
    let self_id = local_node(NodeRole::Consensus).id;
    let storage = FlatStorage::new(NodeRole::Consensus, self_id, 4, true);

    let admitted = (1..=10)
        .filter(|val| storage.add(make_node(*val, NodeRole::Consensus)))
        .count();

    assert_eq!(admitted, 4);
    assert_eq!(storage.len(), 4);
}

#[test]
fn test_flat_add_puts_newest_first_and_bumps_existing() {
    let self_id = local_node(NodeRole::Consensus).id;
    let storage = FlatStorage::new(NodeRole::Consensus, self_id, 4, true);
    let (a, b, c) = (
        make_node(1, NodeRole::Consensus),
        make_node(2, NodeRole::Consensus),
        make_node(3, NodeRole::Consensus),
    );

    storage.add(a.clone());
    storage.add(b.clone());
    storage.add(c.clone());
    assert_eq!(ids(&storage.node_all()), vec![c.id, b.id, a.id]);

    // Re-adding an existing member moves it to the head without duplicating.
    assert!(storage.add(a.clone()));
    assert_eq!(ids(&storage.node_all()), vec![a.id, c.id, b.id]);
}

#[test]
fn test_flat_rejects_self() {
    let self_node = local_node(NodeRole::Proxy);
    let storage = FlatStorage::new(NodeRole::Proxy, self_node.id, 4, true);

    assert!(!storage.add(self_node.clone()));
    storage.stuff(&[self_node]);
    assert_eq!(storage.len(), 0);
}

#[test]
fn test_flat_stuff_appends_only_where_room() {
    let self_id = local_node(NodeRole::Proxy).id;
    let storage = FlatStorage::new(NodeRole::Proxy, self_id, 3, true);
    let head = make_node(1, NodeRole::Proxy);
    storage.add(head.clone());

    let seeds: Vec<Node> = (1..=5).map(|v| make_node(v, NodeRole::Proxy)).collect();
    storage.stuff(&seeds);

    let all = storage.node_all();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, head.id);
    assert_eq!(ids(&all[1..]), vec![seeds[1].id, seeds[2].id]);
}

#[test]
fn test_flat_reports_single_bucket() {
    let storage = FlatStorage::new(NodeRole::Proxy, local_node(NodeRole::Proxy).id, 4, true);
    storage.add(make_node(1, NodeRole::Proxy));

    assert_eq!(storage.bucket_entries().len(), 1);
    assert_eq!(storage.bucket_entries()[0].len(), 1);
    assert_eq!(storage.replacements(), vec![Vec::<Node>::new()]);
    assert_eq!(storage.kind(), StorageKind::Flat);
    assert_eq!(storage.lookup_mode(), LookupMode::SingleRound);
}

#[tokio::test(start_paused = true)]
async fn test_flat_revalidation_success_rotates_tail_to_head() {
    let transport = Arc::new(MockTransport::new());
    let core = test_core(NodeRole::Consensus, Arc::clone(&transport));
    let storage = FlatStorage::new(NodeRole::Consensus, core.self_node.id, 4, true);

    let (n1, n2, n3) = (
        make_node(1, NodeRole::Consensus),
        make_node(2, NodeRole::Consensus),
        make_node(3, NodeRole::Consensus),
    );
    for node in [&n3, &n2, &n1] {
        transport.register(node, Vec::new());
        storage.add(node.clone());
    }
    assert_eq!(ids(&storage.node_all()), vec![n1.id, n2.id, n3.id]);

    storage.do_revalidate(&core).await;

    assert_eq!(transport.ping_count(&n3.id), 1);
    assert_eq!(ids(&storage.node_all()), vec![n3.id, n1.id, n2.id]);
    // Successful revalidation refreshes the bond time.
    assert!(core.store.last_bond(&n3.id).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_flat_revalidation_failure_drops_tail() {
    let transport = Arc::new(MockTransport::new());
    let core = test_core(NodeRole::Consensus, Arc::clone(&transport));
    let storage = FlatStorage::new(NodeRole::Consensus, core.self_node.id, 4, true);

    let (n1, n2, n3) = (
        make_node(1, NodeRole::Consensus),
        make_node(2, NodeRole::Consensus),
        make_node(3, NodeRole::Consensus),
    );
    for node in [&n3, &n2, &n1] {
        transport.register(node, Vec::new());
        storage.add(node.clone());
    }
    transport.set_unreachable(n3.id);

    storage.do_revalidate(&core).await;

    assert_eq!(ids(&storage.node_all()), vec![n1.id, n2.id]);
}

#[tokio::test(start_paused = true)]
async fn test_flat_revalidation_of_empty_set_is_noop() {
    let transport = Arc::new(MockTransport::new());
    let core = test_core(NodeRole::Consensus, Arc::clone(&transport));
    let storage = FlatStorage::new(NodeRole::Consensus, core.self_node.id, 4, true);

    storage.do_revalidate(&core).await;

    assert_eq!(storage.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_flat_no_discover_refresh_sends_nothing() {
    let transport = Arc::new(MockTransport::new());
    let core = test_core(NodeRole::Endpoint, Arc::clone(&transport));
    let storage = FlatStorage::new(NodeRole::Bootnode, core.self_node.id, 4, false);
    let bootnode = make_node(1, NodeRole::Bootnode);
    transport.register(&bootnode, Vec::new());
    storage.add(bootnode.clone());

    storage.do_refresh(&core).await;

    assert_eq!(transport.ping_count(&bootnode.id), 0);
    assert_eq!(transport.find_node_count(&bootnode.id), 0);
}

// ============================================================================
// BucketedStorage
// ============================================================================

#[test]
fn test_bucket_layout_constants() {
    assert_eq!(N_BUCKETS, 17);
    assert_eq!(BUCKET_MIN_DISTANCE, 239);

    assert_eq!(bucket_index(0), 0);
    assert_eq!(bucket_index(BUCKET_MIN_DISTANCE), 0);
    assert_eq!(bucket_index(BUCKET_MIN_DISTANCE + 1), 0);
    assert_eq!(bucket_index(BUCKET_MIN_DISTANCE + 2), 1);
    assert_eq!(bucket_index(256), N_BUCKETS - 1);
}

#[test]
fn test_bucketed_capacity_is_never_exceeded() {
    let config = TableConfig::for_testing();
    let self_id = local_node(NodeRole::Endpoint).id;
    let storage = BucketedStorage::new(NodeRole::Endpoint, self_id, &config);

    for val in 1..=300 {
        storage.add(make_node(val, NodeRole::Endpoint));
    }

    let buckets = storage.bucket_entries();
    assert_eq!(buckets.len(), N_BUCKETS);
    for bucket in &buckets {
        assert!(bucket.len() <= config.bucket_size);
    }
    for replacements in storage.replacements() {
        assert!(replacements.len() <= config.max_replacements);
    }
    assert!(storage.len() <= N_BUCKETS * config.bucket_size);
    // The outermost bucket takes about half of all nodes, so it overflows.
    assert_eq!(buckets[N_BUCKETS - 1].len(), config.bucket_size);
    assert!(storage.replacement_len() > 0);
}

#[test]
fn test_bucketed_readd_takes_new_endpoint_and_keeps_residency() {
    let config = TableConfig::for_testing();
    let self_id = local_node(NodeRole::Endpoint).id;
    let storage = BucketedStorage::new(NodeRole::Endpoint, self_id, &config);

    let nodes = nodes_in_bucket(N_BUCKETS - 1, 2);
    let (a, b) = (nodes[0].clone(), nodes[1].clone());
    storage.add(a.clone());
    storage.add(b.clone());

    let mut moved = a.clone();
    moved.udp = 40404;
    moved.added_at = Timestamp::new(5000);
    assert!(storage.add(moved));

    let bucket = &storage.bucket_entries()[N_BUCKETS - 1];
    assert_eq!(ids(bucket), vec![a.id, b.id]);
    assert_eq!(bucket[0].udp, 40404);
    assert_eq!(bucket[0].added_at, a.added_at);
    assert_eq!(storage.len(), 2);
}

#[test]
fn test_bucketed_full_bucket_keeps_members_and_queues_newcomer() {
    let config = TableConfig::for_testing();
    let self_id = local_node(NodeRole::Endpoint).id;
    let storage = BucketedStorage::new(NodeRole::Endpoint, self_id, &config);

    let nodes = nodes_in_bucket(N_BUCKETS - 1, config.bucket_size + 1);
    for node in &nodes[..config.bucket_size] {
        assert!(storage.add(node.clone()));
    }
    let newcomer = nodes[config.bucket_size].clone();

    assert!(!storage.add(newcomer.clone()));
    assert!(!storage.contains(&newcomer.id));
    assert_eq!(
        ids(&storage.replacements()[N_BUCKETS - 1]),
        vec![newcomer.id]
    );
    for node in &nodes[..config.bucket_size] {
        assert!(storage.contains(&node.id));
    }
}

#[test]
fn test_bucketed_ip_limits_apply_to_public_addresses() {
    let config = TableConfig::for_testing();
    let self_id = local_node(NodeRole::Endpoint).id;
    let storage = BucketedStorage::new(NodeRole::Endpoint, self_id, &config);

    for val in 1..=60u16 {
        storage.add(make_public_node(
            val,
            [203, 0, 113],
            val as u8,
            NodeRole::Endpoint,
        ));
    }

    for bucket in storage.bucket_entries() {
        assert!(bucket.len() <= config.bucket_ip_limit);
    }
    assert!(storage.len() <= config.table_ip_limit);
}

#[test]
fn test_bucketed_lan_addresses_are_exempt_from_ip_limits() {
    let config = TableConfig::for_testing();
    let self_id = local_node(NodeRole::Endpoint).id;
    let storage = BucketedStorage::new(NodeRole::Endpoint, self_id, &config);

    // Same /24 for every node.
    for val in 1..=60u16 {
        let node = Node::new(
            make_node(val, NodeRole::Endpoint).id,
            "192.168.1.10".parse().unwrap(),
            30303,
            30303,
            NodeRole::Endpoint,
            Timestamp::new(1000),
        );
        storage.add(node);
    }

    assert!(storage.len() > config.table_ip_limit);
    assert!(storage
        .bucket_entries()
        .iter()
        .any(|b| b.len() > config.bucket_ip_limit));
}

#[test]
fn test_bucketed_closest_is_sorted_by_distance() {
    let config = TableConfig::for_testing();
    let self_id = local_node(NodeRole::Endpoint).id;
    let storage = BucketedStorage::new(NodeRole::Endpoint, self_id, &config);
    for val in 1..=100 {
        storage.add(make_node(val, NodeRole::Endpoint));
    }

    let target = make_node(5000, NodeRole::Endpoint).id.key();
    let closest = storage.closest(&target, config.bucket_size).into_entries();

    assert_eq!(closest.len(), config.bucket_size);
    for pair in closest.windows(2) {
        assert_ne!(
            dist_cmp(&target, pair[0].key(), pair[1].key()),
            Ordering::Greater
        );
    }
    // Nothing outside the result is closer than its farthest member.
    let farthest = closest.last().unwrap();
    for node in storage.node_all() {
        if !closest.contains(&node) {
            assert_ne!(
                dist_cmp(&target, node.key(), farthest.key()),
                Ordering::Less
            );
        }
    }
}

#[test]
fn test_bucketed_read_random_nodes_is_bounded_and_distinct() {
    let config = TableConfig::for_testing();
    let self_id = local_node(NodeRole::Endpoint).id;
    let storage = BucketedStorage::new(NodeRole::Endpoint, self_id, &config);
    for val in 1..=100 {
        storage.add(make_node(val, NodeRole::Endpoint));
    }

    let picked = storage.read_random_nodes(10);
    assert_eq!(picked.len(), 10);
    let mut unique = ids(&picked);
    unique.sort_by_key(|id| id.key());
    unique.dedup();
    assert_eq!(unique.len(), 10);

    let all = storage.read_random_nodes(10_000);
    assert_eq!(all.len(), storage.len());
}

#[tokio::test(start_paused = true)]
async fn test_bucketed_revalidation_success_moves_tail_to_head() {
    let transport = Arc::new(MockTransport::new());
    let core = test_core(NodeRole::Endpoint, Arc::clone(&transport));
    let storage = BucketedStorage::new(NodeRole::Endpoint, core.self_node.id, &core.config);

    let nodes = nodes_in_bucket(N_BUCKETS - 1, 3);
    for node in &nodes {
        transport.register(node, Vec::new());
        storage.add(node.clone());
    }
    // Head is the most recently added.
    let tail = nodes[0].clone();

    storage.do_revalidate(&core).await;

    let bucket = &storage.bucket_entries()[N_BUCKETS - 1];
    assert_eq!(bucket[0].id, tail.id);
    assert_eq!(bucket.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_bucketed_revalidation_failure_promotes_replacement() {
    let transport = Arc::new(MockTransport::new());
    let core = test_core(NodeRole::Endpoint, Arc::clone(&transport));
    let config = core.config.clone();
    let storage = BucketedStorage::new(NodeRole::Endpoint, core.self_node.id, &config);

    let nodes = nodes_in_bucket(N_BUCKETS - 1, config.bucket_size + 2);
    for node in &nodes {
        transport.register(node, Vec::new());
        storage.add(node.clone());
    }
    let dead = nodes[0].clone();
    let waiting = ids(&nodes[config.bucket_size..]);
    transport.set_unreachable(dead.id);

    storage.do_revalidate(&core).await;

    let bucket = &storage.bucket_entries()[N_BUCKETS - 1];
    assert_eq!(bucket.len(), config.bucket_size);
    assert!(!storage.contains(&dead.id));
    let promoted = bucket.last().unwrap();
    assert!(waiting.contains(&promoted.id));
    assert_eq!(storage.replacements()[N_BUCKETS - 1].len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bucketed_revalidation_failure_without_replacements_removes() {
    let transport = Arc::new(MockTransport::new());
    let core = test_core(NodeRole::Endpoint, Arc::clone(&transport));
    let storage = BucketedStorage::new(NodeRole::Endpoint, core.self_node.id, &core.config);

    let nodes = nodes_in_bucket(N_BUCKETS - 1, 2);
    for node in &nodes {
        transport.register(node, Vec::new());
        storage.add(node.clone());
    }
    transport.set_unreachable(nodes[0].id);

    storage.do_revalidate(&core).await;

    assert_eq!(ids(&storage.node_all()), vec![nodes[1].id]);
}
