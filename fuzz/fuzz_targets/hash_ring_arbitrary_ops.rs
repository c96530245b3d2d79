#![no_main]

use libfuzzer_sys::fuzz_target;
use shardcache::ds::HashRing;

// Fuzz ring construction and lookup
//
// Nodes and keys come from the input. Every lookup must land on a member and
// repeat lookups must agree. Insertion order only matters when two virtual
// nodes collide (the later node wins), so order is checked on collision-free
// rings.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let replicas = usize::from(data[0] % 8) + 1;
    let node_count = usize::from(data[1] % 6);
    let nodes: Vec<String> = (0..node_count).map(|i| format!("node-{i}:{}", data[0])).collect();

    let mut ring = HashRing::new(replicas);
    ring.add(&nodes);
    let mut reversed = HashRing::new(replicas);
    reversed.add(nodes.iter().rev());

    assert!(ring.len() <= replicas * node_count);
    let collision_free = ring.len() == replicas * node_count;

    for chunk in data[2..].chunks(3) {
        let key = String::from_utf8_lossy(chunk);
        match ring.get(&key) {
            Some(owner) => {
                assert!(nodes.iter().any(|n| n == owner));
                assert_eq!(ring.get(&key), Some(owner));
                if collision_free {
                    assert_eq!(reversed.get(&key), Some(owner));
                }
            },
            None => assert!(nodes.is_empty()),
        }
    }
});
