// ==============================================
// DETAILS CACHE CONCURRENCY TESTS (integration)
// ==============================================
//
// Races between placeholder creation, saves, batch reads, low-memory signals
// and dispose. These require multi-threaded execution and cannot live inline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use detailcache::cache::{DetailsCache, loading_placeholder};
use detailcache::details::{CommitIndex, LoadingDetails};
use detailcache::low_memory::LowMemoryNotifier;

type TestCache = DetailsCache<u64, LoadingDetails>;

fn id(n: u32) -> CommitIndex {
    CommitIndex::new(n)
}

// ==============================================
// Placeholder compute-if-absent
// ==============================================

mod placeholder_identity {
    use super::*;

    #[test]
    fn racing_misses_observe_one_placeholder() {
        let iterations = 200;
        let threads = 8;

        for round in 0..iterations {
            let notifier = LowMemoryNotifier::new();
            let cache: Arc<TestCache> = Arc::new(DetailsCache::new(&notifier, loading_placeholder));
            let barrier = Arc::new(Barrier::new(threads));
            let commit = id(round);

            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let cache = Arc::clone(&cache);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        cache
                            .get_cached_data_or_placeholder(commit)
                            .placeholder()
                            .cloned()
                            .expect("nothing was saved, so a placeholder is expected")
                    })
                })
                .collect();

            let placeholders: Vec<Arc<LoadingDetails>> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();
            for p in &placeholders[1..] {
                assert!(
                    Arc::ptr_eq(&placeholders[0], p),
                    "two placeholders were created for {commit}"
                );
            }
            assert_eq!(cache.placeholder_len(), 1);
        }
    }

    #[test]
    fn placeholder_tier_stays_bounded_under_contention() {
        let notifier = LowMemoryNotifier::new();
        let cache: Arc<TestCache> = Arc::new(
            TestCache::builder()
                .placeholder_capacity(64)
                .shards(4)
                .build(&notifier, loading_placeholder),
        );
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for n in 0..1_000 {
                        cache.get_cached_data_or_placeholder(id(t * 1_000 + n));
                        assert!(cache.placeholder_len() <= 64);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.placeholder_len(), 64);
    }
}

// ==============================================
// Saves and reads
// ==============================================

mod save_and_read {
    use super::*;

    #[test]
    fn concurrent_saves_never_exceed_capacity() {
        let notifier = LowMemoryNotifier::new();
        let cache: Arc<TestCache> = Arc::new(DetailsCache::new(&notifier, loading_placeholder));
        let threads = 8u32;
        let per_thread = 2_000u32;
        let barrier = Arc::new(Barrier::new(threads as usize));

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for n in 0..per_thread {
                        let commit = t * per_thread + n;
                        cache.save_in_cache(id(commit), u64::from(commit));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cache.len(), 10_000);
        assert_eq!(cache.evictions(), u64::from(threads * per_thread) - 10_000);
    }

    #[test]
    fn readers_see_only_saved_values() {
        let notifier = LowMemoryNotifier::new();
        let cache: Arc<TestCache> = Arc::new(DetailsCache::new(&notifier, loading_placeholder));
        let done = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(Barrier::new(3));

        let writer = {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                barrier.wait();
                for n in 0..5_000u32 {
                    cache.save_in_cache(id(n % 500), u64::from(n % 500) * 10);
                }
                done.store(true, Ordering::Release);
            })
        };

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    barrier.wait();
                    while !done.load(Ordering::Acquire) {
                        for (commit, value) in cache.get_all_cached_data((0..500).map(id)) {
                            assert_eq!(*value, u64::from(commit.get()) * 10);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(cache.len(), 500);
    }
}

// ==============================================
// Low memory and dispose
// ==============================================

mod lifecycle_races {
    use super::*;

    #[test]
    fn low_memory_signal_races_with_writers() {
        let notifier = LowMemoryNotifier::new();
        let cache: Arc<TestCache> = Arc::new(DetailsCache::new(&notifier, loading_placeholder));
        let barrier = Arc::new(Barrier::new(3));

        let writers: Vec<_> = (0..2u32)
            .map(|t| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for n in 0..5_000u32 {
                        cache.save_in_cache(id(t * 5_000 + n), 1);
                        cache.get_cached_data_or_placeholder(id(n));
                    }
                })
            })
            .collect();

        let signaller = {
            let notifier = notifier.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..50 {
                    assert_eq!(notifier.notify_low_memory(), 1);
                    thread::yield_now();
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        signaller.join().unwrap();

        assert!(cache.len() <= 10_000);
        notifier.notify_low_memory();
        assert!(cache.is_empty());
    }

    #[test]
    fn dispose_during_signal_is_safe() {
        for _ in 0..100 {
            let notifier = LowMemoryNotifier::new();
            let cache: Arc<TestCache> =
                Arc::new(DetailsCache::new(&notifier, loading_placeholder));
            for n in 0..100 {
                cache.save_in_cache(id(n), 0);
            }
            let barrier = Arc::new(Barrier::new(2));

            let disposer = {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.dispose();
                })
            };
            let signaller = {
                let notifier = notifier.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    notifier.notify_low_memory()
                })
            };

            disposer.join().unwrap();
            assert!(signaller.join().unwrap() <= 1);
            assert!(cache.is_empty());
            assert_eq!(cache.placeholder_len(), 0);
            assert_eq!(notifier.listener_count(), 0);
        }
    }
}
