// Many threads hammering handles that share a few roots.
//
// Run the shuttle variants with:
//   cargo test --features shuttle -- shuttle

#[cfg(not(feature = "shuttle"))]
mod threads {
    use pretty_assertions::assert_eq;
    use rand::Rng;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering::Relaxed;
    use std::sync::Arc;
    use std::thread;

    use crate::arc::test_support::DropCounter;
    use crate::{make_shared_with, SharedHandle, WeakHandle};

    const THREADS: usize = 8;
    const ROOTS: usize = 3;
    const ROUNDS: usize = 2000;
    const HOLDERS: usize = 4;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn copy_and_reassign_keeps_counts_exact() {
        init_logging();
        let drops = Arc::new(AtomicUsize::new(0));
        let roots: Vec<SharedHandle<DropCounter>> = (0..ROOTS)
            .map(|i| {
                if i % 2 == 0 {
                    SharedHandle::new(DropCounter::with_counter(&drops))
                } else {
                    make_shared_with(|| DropCounter::with_counter(&drops))
                }
            })
            .collect();

        // Each thread ends holding HOLDERS handles; record which roots they point at.
        let survivors: Vec<Vec<SharedHandle<DropCounter>>> = thread::scope(|s| {
            let workers: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        let mut rng = rand::thread_rng();
                        let mut held: Vec<SharedHandle<DropCounter>> =
                            (0..HOLDERS).map(|_| SharedHandle::null()).collect();
                        for _ in 0..ROUNDS {
                            let slot = rng.gen_range(0..HOLDERS);
                            let root = &roots[rng.gen_range(0..ROOTS)];
                            if rng.gen_bool(0.5) {
                                held[slot].assign(root);
                            } else {
                                held[slot] = root.clone();
                            }
                            let copy = held[rng.gen_range(0..HOLDERS)].clone();
                            drop(copy);
                        }
                        held
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(drops.load(Relaxed), 0);
        for root in &roots {
            let holders = survivors
                .iter()
                .flatten()
                .filter(|held| SharedHandle::ptr_eq(held, root))
                .count();
            assert_eq!(root.use_count(), holders + 1);
        }

        drop(survivors);
        for root in &roots {
            assert_eq!(root.use_count(), 1);
        }
        drop(roots);
        assert_eq!(drops.load(Relaxed), ROOTS);
    }

    #[test]
    fn lock_racing_last_drop_never_resurrects() {
        init_logging();
        for _ in 0..200 {
            let drops = Arc::new(AtomicUsize::new(0));
            let shared = SharedHandle::new(DropCounter::with_counter(&drops));
            let weak = shared.downgrade();
            let observed_alive = AtomicUsize::new(0);

            thread::scope(|s| {
                for _ in 0..4 {
                    let weak = weak.clone();
                    let drops = &drops;
                    let observed_alive = &observed_alive;
                    s.spawn(move || {
                        for _ in 0..50 {
                            let locked = weak.lock();
                            if !locked.is_null() {
                                // A successful lock must see a payload that is not destroyed.
                                assert_eq!(drops.load(Relaxed), 0);
                                observed_alive.fetch_add(1, Relaxed);
                            }
                        }
                    });
                }
                s.spawn(move || drop(shared));
            });

            assert_eq!(drops.load(Relaxed), 1);
            assert!(weak.lock().is_null());
            assert!(!weak.is_valid());
        }
    }

    #[test]
    fn weak_handles_dropped_concurrently_with_owner() {
        let drops = Arc::new(AtomicUsize::new(0));
        for _ in 0..200 {
            let shared = make_shared_with(|| DropCounter::with_counter(&drops));
            let weaks: Vec<WeakHandle<DropCounter>> = (0..4).map(|_| shared.downgrade()).collect();
            thread::scope(|s| {
                for weak in weaks {
                    s.spawn(move || drop(weak));
                }
                s.spawn(move || drop(shared));
            });
        }
        assert_eq!(drops.load(Relaxed), 200);
    }
}

#[cfg(feature = "shuttle")]
mod shuttle_tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering::SeqCst;
    use std::sync::Arc;

    use crate::arc::test_support::DropCounter;
    use crate::{make_shared_with, SharedHandle};

    #[test]
    fn shuttle_lock_racing_last_drop() {
        shuttle::check_random(
            || {
                let drops = Arc::new(AtomicUsize::new(0));
                let shared = SharedHandle::new(DropCounter::with_counter(&drops));
                let weak = shared.downgrade();

                let locker = {
                    let weak = weak.clone();
                    let drops = drops.clone();
                    shuttle::thread::spawn(move || {
                        let locked = weak.lock();
                        if !locked.is_null() {
                            assert_eq!(drops.load(SeqCst), 0);
                        }
                    })
                };
                let dropper = shuttle::thread::spawn(move || drop(shared));

                locker.join().unwrap();
                dropper.join().unwrap();
                assert_eq!(drops.load(SeqCst), 1);
                assert!(weak.lock().is_null());
            },
            1000,
        );
    }

    #[test]
    fn shuttle_clone_and_drop_across_threads() {
        shuttle::check_random(
            || {
                let drops = Arc::new(AtomicUsize::new(0));
                let root = make_shared_with(|| DropCounter::with_counter(&drops));
                let handles: Vec<_> = (0..3)
                    .map(|_| {
                        let mine = root.clone();
                        shuttle::thread::spawn(move || {
                            let copy = mine.clone();
                            let weak = copy.downgrade();
                            drop(mine);
                            drop(copy);
                            drop(weak.lock());
                        })
                    })
                    .collect();
                drop(root);
                for handle in handles {
                    handle.join().unwrap();
                }
                assert_eq!(drops.load(SeqCst), 1);
            },
            1000,
        );
    }
}
