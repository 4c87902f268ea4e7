// ==============================================
// COMMIT DETAILS GETTER TESTS (integration)
// ==============================================
//
// End-to-end loading through storage, providers and the cache, including
// concurrent loaders and low-memory signals between loads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use detailcache::prelude::*;

/// Serves every requested hash and counts records delivered.
#[derive(Default)]
struct CountingProvider {
    delivered: AtomicUsize,
}

impl LogProvider for CountingProvider {
    fn read_full_details(
        &self,
        root: &VcsRoot,
        hashes: &[CommitHash],
        consumer: &mut dyn FnMut(FullCommitDetails),
    ) -> Result<(), BoxError> {
        for hash in hashes {
            let author = VcsUser::new("Grace", "grace@example.com");
            consumer(FullCommitDetails {
                id: CommitId::new(hash.clone(), root.clone()),
                parents: Vec::new(),
                author: author.clone(),
                committer: author,
                author_time: 0,
                commit_time: 0,
                subject: hash.as_str().to_owned(),
                full_message: hash.as_str().to_owned(),
                changes: vec![FileChange::modified("src/lib.rs")],
            });
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

struct Setup {
    notifier: LowMemoryNotifier,
    provider: Arc<CountingProvider>,
    getter: Arc<CommitDetailsGetter<InMemoryCommitStorage>>,
    commits: Vec<CommitIndex>,
}

fn setup(count: u32) -> Setup {
    let notifier = LowMemoryNotifier::new();
    let storage = Arc::new(InMemoryCommitStorage::new());
    let root = VcsRoot::new("/work/repo");
    let commits = (0..count)
        .map(|n| {
            let id = CommitId::new(CommitHash::new(format!("{n:040x}")), root.clone());
            storage.commit_index(&id).unwrap()
        })
        .collect();
    let provider = Arc::new(CountingProvider::default());
    let providers = [(root, Arc::clone(&provider) as Arc<dyn LogProvider>)];
    let getter = Arc::new(CommitDetailsGetter::new(storage, providers, &notifier));
    Setup {
        notifier,
        provider,
        getter,
        commits,
    }
}

#[test]
fn loaded_details_match_storage_ids() {
    let s = setup(50);
    let details = s.getter.load_commits_data(&s.commits).unwrap();

    for (commit, details) in s.commits.iter().zip(&details) {
        let id = s.getter.storage().commit_id(*commit).unwrap();
        assert_eq!(details.id, id);
    }
    assert_eq!(s.getter.get_all_cached_data(s.commits.iter().copied()).len(), 50);
}

#[test]
fn low_memory_signal_forces_reload() {
    let s = setup(10);
    s.getter.load_commits_data(&s.commits).unwrap();
    assert_eq!(s.provider.delivered.load(Ordering::Relaxed), 10);

    s.notifier.notify_low_memory();
    assert!(s.getter.get_cached_data_or_placeholder(s.commits[0]).is_placeholder());

    s.getter.load_commits_data(&s.commits[..3]).unwrap();
    assert_eq!(s.provider.delivered.load(Ordering::Relaxed), 13);
}

#[test]
fn concurrent_loaders_return_consistent_details() {
    let s = setup(200);
    let threads = 4;
    let barrier = Arc::new(Barrier::new(threads));
    let commits = Arc::new(s.commits.clone());

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let getter = Arc::clone(&s.getter);
            let barrier = Arc::clone(&barrier);
            let commits = Arc::clone(&commits);
            thread::spawn(move || {
                barrier.wait();
                let mut requested: Vec<CommitIndex> = commits.to_vec();
                requested.rotate_left(t * 50);
                let details = getter.load_commits_data(&requested).unwrap();
                for (commit, details) in requested.iter().zip(&details) {
                    let expected = getter.storage().commit_id(*commit).unwrap();
                    assert_eq!(details.hash(), &expected.hash);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // Loaders may overlap, so a commit can be read more than once, but every
    // commit ends up cached.
    assert!(s.provider.delivered.load(Ordering::Relaxed) >= 200);
    assert_eq!(s.getter.cache().len(), 200);
}
