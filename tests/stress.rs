use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::thread;
use rand::Rng;

use rcown::SharedOwner;

const THREADS: usize = 16;
const OPS: usize = 512;

#[test]
fn concurrent_clone_and_drop_destroys_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let owner = SharedOwner::with_deleter(vec![7u64; 32], move |_| {
        h.fetch_add(1, Ordering::SeqCst);
    });

    thread::scope(|s| {
        for _ in 0..THREADS {
            let local = owner.clone();
            s.spawn(move |_| {
                let mut rng = rand::thread_rng();
                let mut clones: Vec<SharedOwner<Vec<u64>>> = Vec::new();
                for _ in 0..OPS {
                    if clones.is_empty() || rng.gen::<bool>() {
                        clones.push(local.clone());
                    } else {
                        let at = rng.gen_range(0..clones.len());
                        drop(clones.swap_remove(at));
                    }
                    assert_eq!(local.get().unwrap().len(), 32);
                }
            });
        }
    })
    .unwrap();

    // Every thread-local clone is gone; only the original remains.
    assert_eq!(owner.use_count(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    drop(owner);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn promotion_races_cleanly_with_the_last_drop() {
    for _ in 0..256 {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let owner = SharedOwner::with_deleter(String::from("payload"), move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let observer = owner.downgrade();
        let hits_at_access = hits.clone();

        thread::scope(|s| {
            s.spawn(move |_| drop(owner));
            s.spawn(move |_| match observer.promote() {
                Some(strong) => {
                    // A successful promotion pins the value: destruction
                    // cannot have started.
                    assert_eq!(hits_at_access.load(Ordering::SeqCst), 0);
                    assert_eq!(strong.get().unwrap(), "payload");
                }
                None => assert!(observer.expired()),
            });
        })
        .unwrap();

        // Whichever side won, the value died exactly once.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn expiry_is_permanent_under_a_promotion_storm() {
    let owner = SharedOwner::new(42u64);
    let observer = owner.downgrade();

    thread::scope(|s| {
        for _ in 0..THREADS / 2 {
            let local = observer.clone();
            s.spawn(move |_| {
                let mut seen_dead = false;
                for _ in 0..OPS {
                    match local.promote() {
                        Some(strong) => {
                            assert!(!seen_dead, "a dead value was promoted back to life");
                            assert_eq!(*strong.get().unwrap(), 42);
                        }
                        None => seen_dead = true,
                    }
                }
            });
        }
        s.spawn(move |_| drop(owner));
    })
    .unwrap();

    assert!(observer.expired());
    assert!(observer.promote().is_none());
}

#[test]
fn weak_observers_churn_concurrently() {
    let owner = SharedOwner::new(String::from("observed"));

    thread::scope(|s| {
        for _ in 0..THREADS / 2 {
            let local = owner.downgrade();
            s.spawn(move |_| {
                let mut rng = rand::thread_rng();
                let mut observers = Vec::new();
                for _ in 0..OPS {
                    if observers.is_empty() || rng.gen::<bool>() {
                        observers.push(local.clone());
                    } else {
                        let at = rng.gen_range(0..observers.len());
                        drop(observers.swap_remove(at));
                    }
                }
                for observer in &observers {
                    assert_eq!(observer.promote().unwrap().get().unwrap(), "observed");
                }
            });
        }
    })
    .unwrap();

    assert_eq!(owner.use_count(), 1);
    assert_eq!(owner.weak_count(), 0);
    assert_eq!(owner.get().unwrap(), "observed");
}
