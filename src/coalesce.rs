//! Call coalescing: one execution per key, any number of waiters.
//!
//! [`Coalescer::work`] runs the supplied closure on the calling thread when no
//! call for the key is outstanding. Callers that arrive while it runs block on
//! that call's completion latch and receive a clone of its result instead of
//! running their own closure.
//!
//! ```text
//!   thread A: work("k", f_a) ──► leader: runs f_a ─────────────► Done(v) ──► v
//!   thread B: work("k", f_b) ──► follower: waits on latch ──────────────────► v
//!   thread C: work("j", f_c) ──► leader for "j" (never blocked by "k")
//! ```
//!
//! The in-flight map lock is held only for bookkeeping, never while a closure
//! runs. Results are not cached: once a call completes its entry is removed
//! and the next `work` for the key runs fresh, so a failure is not retried on
//! the waiters' behalf.
//!
//! If the leader's closure panics, the latch is marked abandoned and the entry
//! cleared; blocked followers wake up and one of them becomes the new leader.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

enum State<T> {
    Pending,
    Done(T),
    Abandoned,
}

/// Completion latch shared by the leader and every follower of one call.
struct Call<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Call<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending),
            ready: Condvar::new(),
        }
    }

    /// Blocks until the call settles; `None` means the leader went away.
    fn wait(&self) -> Option<T>
    where
        T: Clone,
    {
        let mut state = self.state.lock();
        loop {
            match &*state {
                State::Pending => self.ready.wait(&mut state),
                State::Done(value) => return Some(value.clone()),
                State::Abandoned => return None,
            }
        }
    }

    fn settle(&self, outcome: State<T>) {
        *self.state.lock() = outcome;
        self.ready.notify_all();
    }
}

/// Deduplicates concurrent calls that share a key.
pub struct Coalescer<K, T> {
    calls: Mutex<FxHashMap<K, Arc<Call<T>>>>,
}

impl<K, T> Coalescer<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(FxHashMap::default()),
        }
    }

    /// Runs `func` unless a call for `key` is already in flight, in which case
    /// this blocks and returns that call's result.
    pub fn work<F>(&self, key: K, func: F) -> T
    where
        F: FnOnce() -> T,
    {
        let call = loop {
            let mut calls = self.calls.lock();
            if let Some(call) = calls.get(&key).cloned() {
                drop(calls);
                if let Some(value) = call.wait() {
                    return value;
                }
                continue;
            }
            let call = Arc::new(Call::new());
            calls.insert(key.clone(), Arc::clone(&call));
            break call;
        };

        let guard = LeaderGuard {
            calls: &self.calls,
            key,
            call,
            settled: false,
        };
        let value = func();
        guard.finish(value.clone());
        value
    }

    /// Number of keys with a call currently executing.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<K, T> Default for Coalescer<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> fmt::Debug for Coalescer<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coalescer")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

/// Publishes the leader's outcome and clears its map entry, also on unwind.
struct LeaderGuard<'a, K, T>
where
    K: Hash + Eq,
{
    calls: &'a Mutex<FxHashMap<K, Arc<Call<T>>>>,
    key: K,
    call: Arc<Call<T>>,
    settled: bool,
}

impl<K, T> LeaderGuard<'_, K, T>
where
    K: Hash + Eq,
{
    fn finish(mut self, value: T) {
        self.call.settle(State::Done(value));
        self.settled = true;
        self.forget();
    }

    fn forget(&self) {
        let mut calls = self.calls.lock();
        if calls
            .get(&self.key)
            .is_some_and(|current| Arc::ptr_eq(current, &self.call))
        {
            calls.remove(&self.key);
        }
    }
}

impl<K, T> Drop for LeaderGuard<'_, K, T>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        if !self.settled {
            self.forget();
            self.call.settle(State::Abandoned);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, mpsc};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn direct_call_returns_value() {
        let group: Coalescer<&str, String> = Coalescer::new();
        assert_eq!(group.work("key", || "bar".to_string()), "bar");
        assert_eq!(group.in_flight(), 0);
    }

    #[test]
    fn errors_are_returned_not_cached() {
        let group: Coalescer<&str, Result<u32, String>> = Coalescer::new();
        assert_eq!(group.work("key", || Err("boom".into())), Err("boom".to_string()));
        assert_eq!(group.work("key", || Ok(1)), Ok(1));
    }

    #[test]
    fn concurrent_callers_share_one_execution() {
        let group = Arc::new(Coalescer::<String, usize>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let leader = {
            let group = Arc::clone(&group);
            let calls = Arc::clone(&calls);
            thread::spawn(move || {
                group.work("key".into(), move || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    calls.fetch_add(1, Ordering::SeqCst) + 42
                })
            })
        };
        started_rx.recv().unwrap();
        assert_eq!(group.in_flight(), 1);

        let followers: Vec<_> = (0..8)
            .map(|_| {
                let group = Arc::clone(&group);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    group.work("key".into(), move || calls.fetch_add(1, Ordering::SeqCst) + 1000)
                })
            })
            .collect();

        // Give followers time to park on the latch.
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        assert_eq!(leader.join().unwrap(), 42);
        for follower in followers {
            let value = follower.join().unwrap();
            // A follower that arrived after the leader finished runs on its own.
            assert!(value == 42 || value >= 1000);
        }
        assert_eq!(group.in_flight(), 0);
    }

    #[test]
    fn distinct_keys_do_not_block_each_other() {
        let group = Arc::new(Coalescer::<u32, u32>::new());
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let barrier = Arc::new(Barrier::new(2));

        let slow = {
            let group = Arc::clone(&group);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                group.work(1, move || {
                    barrier.wait();
                    release_rx.recv().unwrap();
                    1
                })
            })
        };
        barrier.wait();
        assert_eq!(group.work(2, || 2), 2);
        release_tx.send(()).unwrap();
        assert_eq!(slow.join().unwrap(), 1);
    }

    #[test]
    fn panicking_leader_hands_off_to_follower() {
        let group = Arc::new(Coalescer::<&'static str, u32>::new());
        let barrier = Arc::new(Barrier::new(2));

        let leader = {
            let group = Arc::clone(&group);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                group.work("key", move || {
                    barrier.wait();
                    thread::sleep(Duration::from_millis(50));
                    panic!("loader blew up");
                })
            })
        };

        barrier.wait();
        let follower = {
            let group = Arc::clone(&group);
            thread::spawn(move || group.work("key", || 7))
        };

        assert!(leader.join().is_err());
        assert_eq!(follower.join().unwrap(), 7);
        assert_eq!(group.in_flight(), 0);
    }

    #[test]
    fn leader_guard_settles_values_that_are_not_clone() {
        #[derive(Debug, PartialEq)]
        struct Token(u32);

        let calls: Mutex<FxHashMap<&str, Arc<Call<Token>>>> = Mutex::new(FxHashMap::default());
        let done = Arc::new(Call::new());
        calls.lock().insert("done", Arc::clone(&done));
        let guard = LeaderGuard {
            calls: &calls,
            key: "done",
            call: Arc::clone(&done),
            settled: false,
        };
        guard.finish(Token(1));
        assert!(matches!(&*done.state.lock(), State::Done(Token(1))));

        let dropped = Arc::new(Call::new());
        calls.lock().insert("dropped", Arc::clone(&dropped));
        drop(LeaderGuard {
            calls: &calls,
            key: "dropped",
            call: Arc::clone(&dropped),
            settled: false,
        });
        assert!(matches!(&*dropped.state.lock(), State::Abandoned));
        assert!(calls.lock().is_empty());
    }
}
