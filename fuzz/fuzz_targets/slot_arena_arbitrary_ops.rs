#![no_main]

use libfuzzer_sys::fuzz_target;
use shardcache::ds::SlotArena;

// Fuzz arbitrary operation sequences on SlotArena
//
// Random insert, remove, get_mut, contains, iter and clear, checked against
// a shadow vector of live ids.
fuzz_target!(|data: &[u8]| {
    let mut arena: SlotArena<u32> = SlotArena::new();
    let mut live: Vec<(shardcache::ds::SlotId, u32)> = Vec::new();

    for pair in data.chunks_exact(2) {
        let op = pair[0] % 6;
        let value = u32::from(pair[1]);

        match op {
            0 => {
                let id = arena.insert(value);
                assert_eq!(arena.get(id), Some(&value));
                live.push((id, value));
            },
            1 => {
                if !live.is_empty() {
                    let (id, expected) = live.swap_remove(value as usize % live.len());
                    assert_eq!(arena.remove(id), Some(expected));
                    assert!(!arena.contains(id));
                    assert_eq!(arena.remove(id), None);
                }
            },
            2 => {
                if !live.is_empty() {
                    let slot = value as usize % live.len();
                    let (id, _) = live[slot];
                    if let Some(v) = arena.get_mut(id) {
                        *v = value;
                    }
                    live[slot].1 = value;
                    assert_eq!(arena.get(id), Some(&value));
                }
            },
            3 => {
                for (id, expected) in &live {
                    assert!(arena.contains(*id));
                    assert_eq!(arena.get(*id), Some(expected));
                }
            },
            4 => {
                assert_eq!(arena.iter().count(), live.len());
            },
            5 => {
                arena.clear();
                live.clear();
                assert!(arena.is_empty());
            },
            _ => unreachable!(),
        }

        assert_eq!(arena.len(), live.len());
        assert_eq!(arena.is_empty(), live.is_empty());
    }
});
