// ==============================================
// GROUP CONCURRENCY TESTS (integration)
// ==============================================
//
// Stampede protection and store bounds under many concurrent callers.
// These require multi-threaded execution and cannot live inline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use shardcache::error::GroupError;
use shardcache::registry::GroupRegistry;
use shardcache::traits::LoaderFn;

// ==============================================
// Coalescing
// ==============================================

mod coalescing {
    use super::*;

    #[test]
    fn concurrent_misses_share_one_loader_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = GroupRegistry::new();
        let group = registry.new_group(
            "slow",
            0,
            LoaderFn::new(move |key| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(150));
                Ok(format!("value:{key}").into_bytes())
            }),
        );

        let n = 32;
        let barrier = Arc::new(Barrier::new(n));
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let group = Arc::clone(&group);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    group.get("hot-key").map(|v| v.to_vec())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), b"value:hot-key");
        }

        let stats = group.stats();
        assert_eq!(stats.gets, n as u64);
        assert_eq!(stats.loads_executed, 1);
        assert_eq!(stats.local_loads, 1);
    }

    #[test]
    fn concurrent_failures_share_one_error_instance() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = GroupRegistry::new();
        let group = registry.new_group(
            "broken",
            0,
            LoaderFn::new(move |_key| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(150));
                Err("backend down".into())
            }),
        );

        let n = 8;
        let barrier = Arc::new(Barrier::new(n));
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let group = Arc::clone(&group);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    group.get("k")
                })
            })
            .collect();

        let errors: Vec<_> = handles
            .into_iter()
            .map(|h| match h.join().unwrap() {
                Err(GroupError::Load(err)) => err,
                other => panic!("expected load error, got {other:?}"),
            })
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for err in &errors {
            assert!(Arc::ptr_eq(err, &errors[0]));
            assert_eq!(err.to_string(), "backend down");
        }

        // The failure was not cached; the next call tries again.
        assert!(group.get("k").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn different_keys_load_independently() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = GroupRegistry::new();
        let group = registry.new_group(
            "fanout",
            0,
            LoaderFn::new(move |key| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                Ok(key.as_bytes().to_vec())
            }),
        );

        let keys = 16;
        let barrier = Arc::new(Barrier::new(keys * 2));
        let handles: Vec<_> = (0..keys * 2)
            .map(|i| {
                let group = Arc::clone(&group);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let key = format!("key-{}", i % keys);
                    assert_eq!(group.get(&key).unwrap().as_slice(), key.as_bytes());
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), keys);
    }
}

// ==============================================
// Store bounds
// ==============================================

mod store_bounds {
    use super::*;

    #[test]
    fn concurrent_loads_respect_byte_budget() {
        let budget = 256;
        let registry = GroupRegistry::new();
        let group = registry.new_group(
            "bounded",
            budget,
            LoaderFn::new(|key| Ok(vec![b'x'; key.len() * 2])),
        );

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let group = Arc::clone(&group);
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = format!("{t}:{}", i % 97);
                        group.get(&key).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = group.cache_stats();
        assert!(stats.bytes <= budget, "{} > {budget}", stats.bytes);
        assert!(stats.evictions > 0);
    }
}
