#![no_main]

use libfuzzer_sys::fuzz_target;
use shardcache::policy::LruCore;

// Fuzz arbitrary operation sequences on the byte-bounded LRU store
//
// The first byte picks a budget; the rest drive add, get, peek and
// remove_oldest over a small key space so replacements are common.
fuzz_target!(|data: &[u8]| {
    let Some((&budget, ops)) = data.split_first() else {
        return;
    };
    let capacity = usize::from(budget);
    let mut store: LruCore<Vec<u8>> = LruCore::new(capacity);

    for pair in ops.chunks_exact(2) {
        let op = pair[0] % 4;
        let key = format!("k{}", pair[1] % 16);
        let len = usize::from(pair[0] >> 2);

        match op {
            0 => {
                store.add(&key, vec![0u8; len]);
                if capacity == 0 || key.len() + len <= capacity {
                    assert_eq!(store.peek(&key).map(Vec::len), Some(len));
                }
            },
            1 => {
                let before = store.len();
                let _ = store.get(&key);
                assert_eq!(store.len(), before);
            },
            2 => {
                let _ = store.peek(&key);
            },
            3 => {
                let before = store.len();
                let removed = store.remove_oldest();
                assert_eq!(removed, before > 0);
                assert_eq!(store.len(), before - usize::from(removed));
            },
            _ => unreachable!(),
        }

        if capacity != 0 {
            assert!(store.used_bytes() <= capacity);
        }
        assert!(store.check_invariants().is_ok());
    }
});
