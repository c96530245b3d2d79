#![no_main]

use libfuzzer_sys::fuzz_target;
use shardcache::ds::IntrusiveList;

// Fuzz arbitrary operation sequences on IntrusiveList
//
// Random push_front, pop_back, move_to_front, remove and clear, checked
// against a VecDeque model (front = most recent).
fuzz_target!(|data: &[u8]| {
    let mut list: IntrusiveList<u32> = IntrusiveList::new();
    let mut model = std::collections::VecDeque::new();

    for pair in data.chunks_exact(2) {
        let op = pair[0] % 5;
        let value = u32::from(pair[1]);

        match op {
            0 => {
                let id = list.push_front(value);
                model.push_front((id, value));
            },
            1 => {
                let popped = list.pop_back();
                assert_eq!(popped, model.pop_back().map(|(_, v)| v));
            },
            2 => {
                if !model.is_empty() {
                    let pos = value as usize % model.len();
                    if let Some(entry) = model.remove(pos) {
                        assert!(list.move_to_front(entry.0));
                        model.push_front(entry);
                    }
                }
            },
            3 => {
                if !model.is_empty() {
                    let pos = value as usize % model.len();
                    if let Some((id, v)) = model.remove(pos) {
                        assert_eq!(list.remove(id), Some(v));
                        assert!(!list.contains(id));
                    }
                }
            },
            4 => {
                list.clear();
                model.clear();
            },
            _ => unreachable!(),
        }

        assert_eq!(list.len(), model.len());
        assert_eq!(list.front_id(), model.front().map(|(id, _)| *id));
        assert_eq!(list.back_id(), model.back().map(|(id, _)| *id));
        assert!(list.check_invariants().is_ok());
    }

    let order: Vec<u32> = list.iter().map(|(_, v)| *v).collect();
    let expected: Vec<u32> = model.iter().map(|(_, v)| *v).collect();
    assert_eq!(order, expected);
});
