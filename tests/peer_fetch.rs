// ==============================================
// MULTI-NODE TESTS (integration)
// ==============================================
//
// Two or three in-process "nodes", each with its own registry, wired together
// through a loopback PeerGetter that calls the owner's registry directly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use shardcache::error::{BoxError, GroupError};
use shardcache::group::Group;
use shardcache::peers::RingPeerPicker;
use shardcache::registry::GroupRegistry;
use shardcache::traits::{FetchRequest, FetchResponse, LoaderFn, PeerGetter};

/// Reaches another node's registry without a network hop.
struct Loopback {
    registry: Arc<GroupRegistry>,
    down: Arc<AtomicBool>,
}

impl PeerGetter for Loopback {
    fn get(&self, request: &FetchRequest) -> Result<FetchResponse, BoxError> {
        if self.down.load(Ordering::SeqCst) {
            return Err("peer unreachable".into());
        }
        Ok(self.registry.serve(request)?)
    }
}

struct Node {
    name: String,
    registry: Arc<GroupRegistry>,
    group: Arc<Group>,
    loads: Arc<AtomicUsize>,
    down: Arc<AtomicBool>,
}

fn cluster(names: &[&str]) -> Vec<Node> {
    let nodes: Vec<Node> = names
        .iter()
        .map(|name| {
            let registry = Arc::new(GroupRegistry::new());
            let loads = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&loads);
            let group = registry.new_group(
                "scores",
                1 << 16,
                LoaderFn::new(move |key| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(format!("db:{key}").into_bytes())
                }),
            );
            Node {
                name: name.to_string(),
                registry,
                group,
                loads,
                down: Arc::new(AtomicBool::new(false)),
            }
        })
        .collect();

    for node in &nodes {
        let picker = RingPeerPicker::new(node.name.clone());
        picker.set_peers(nodes.iter().map(|peer| {
            let getter: Arc<dyn PeerGetter> = Arc::new(Loopback {
                registry: Arc::clone(&peer.registry),
                down: Arc::clone(&peer.down),
            });
            (peer.name.clone(), getter)
        }));
        node.group.register_peers(picker);
    }
    nodes
}

fn owner_index(nodes: &[Node], key: &str) -> usize {
    let picker = RingPeerPicker::new("observer");
    picker.set_peers(nodes.iter().map(|n| {
        let getter: Arc<dyn PeerGetter> = Arc::new(Loopback {
            registry: Arc::clone(&n.registry),
            down: Arc::new(AtomicBool::new(false)),
        });
        (n.name.clone(), getter)
    }));
    let owner = picker.owner_of(key).expect("non-empty ring");
    nodes.iter().position(|n| n.name == owner).expect("owner is a member")
}

#[test]
fn only_the_owner_loads_and_caches() {
    let nodes = cluster(&["10.0.0.1:8001", "10.0.0.2:8001", "10.0.0.3:8001"]);
    let keys: Vec<String> = (0..60).map(|i| format!("user:{i}")).collect();

    for key in &keys {
        for node in &nodes {
            assert_eq!(node.group.get(key).unwrap().to_vec(), format!("db:{key}").into_bytes());
        }
    }

    // Every key was loaded exactly once cluster-wide, by its owner.
    let total_loads: usize = nodes.iter().map(|n| n.loads.load(Ordering::SeqCst)).sum();
    assert_eq!(total_loads, keys.len());

    let mut per_owner: HashMap<usize, usize> = HashMap::new();
    for key in &keys {
        *per_owner.entry(owner_index(&nodes, key)).or_default() += 1;
    }
    for (idx, node) in nodes.iter().enumerate() {
        let owned = per_owner.get(&idx).copied().unwrap_or(0);
        assert_eq!(node.loads.load(Ordering::SeqCst), owned, "node {}", node.name);
        assert_eq!(node.group.cache_stats().items, owned, "node {}", node.name);
    }
}

#[test]
fn unreachable_owner_falls_back_to_local_load() {
    let nodes = cluster(&["a:1", "b:1"]);

    let key = (0..)
        .map(|i| format!("k{i}"))
        .find(|key| owner_index(&nodes, key) == 1)
        .expect("some key is owned by b");

    nodes[1].down.store(true, Ordering::SeqCst);
    let value = nodes[0].group.get(&key).unwrap();
    assert_eq!(value.to_vec(), format!("db:{key}").into_bytes());

    let stats = nodes[0].group.stats();
    assert_eq!(stats.peer_errors, 1);
    assert_eq!(stats.local_loads, 1);
    assert_eq!(nodes[1].loads.load(Ordering::SeqCst), 0);
}

#[test]
fn reachable_owner_serves_without_local_load() {
    let nodes = cluster(&["a:1", "b:1"]);
    let key = (0..)
        .map(|i| format!("k{i}"))
        .find(|key| owner_index(&nodes, key) == 1)
        .expect("some key is owned by b");

    assert!(nodes[0].group.get(&key).is_ok());
    assert!(nodes[0].group.get(&key).is_ok());

    let stats = nodes[0].group.stats();
    assert_eq!(stats.peer_loads, 2);
    assert_eq!(stats.local_loads, 0);
    assert_eq!(nodes[0].loads.load(Ordering::SeqCst), 0);
    assert_eq!(nodes[1].loads.load(Ordering::SeqCst), 1);
    assert_eq!(nodes[1].group.stats().cache_hits, 1);
}

#[test]
fn serve_rejects_unknown_group() {
    let nodes = cluster(&["a:1"]);
    let request = FetchRequest {
        group: "missing".into(),
        key: "k".into(),
    };
    let err = nodes[0].registry.serve(&request).unwrap_err();
    assert!(matches!(err, GroupError::NoSuchGroup(name) if name == "missing"));
}
