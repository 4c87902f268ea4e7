//! Walks a commit log the way a history view does: placeholders first, then
//! real details once the loader has read them.
//!
//! Run with: RUST_LOG=detailcache=debug cargo run --example commit_log

use std::sync::Arc;

use detailcache::prelude::*;

/// Pretends to read commits from a repository on disk.
struct SyntheticProvider;

impl LogProvider for SyntheticProvider {
    fn read_full_details(
        &self,
        root: &VcsRoot,
        hashes: &[CommitHash],
        consumer: &mut dyn FnMut(FullCommitDetails),
    ) -> Result<(), BoxError> {
        for (n, hash) in hashes.iter().enumerate() {
            let author = VcsUser::new("Linus", "linus@example.com");
            consumer(FullCommitDetails {
                id: CommitId::new(hash.clone(), root.clone()),
                parents: Vec::new(),
                author: author.clone(),
                committer: author,
                author_time: 1_700_000_000_000 + n as u64,
                commit_time: 1_700_000_000_000 + n as u64,
                subject: format!("Change number {}", n),
                full_message: format!("Change number {}\n\nSigned-off-by: Linus", n),
                changes: vec![FileChange::modified(format!("src/file_{}.rs", n % 7))],
            });
        }
        Ok(())
    }
}

fn main() -> Result<(), LoadError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let notifier = LowMemoryNotifier::new();
    let storage = Arc::new(InMemoryCommitStorage::new());
    let root = VcsRoot::new("/src/kernel");

    let visible: Vec<CommitIndex> = (0..20u32)
        .filter_map(|n| {
            let hash = CommitHash::new(format!("{:040x}", 0xabc000 + n));
            storage.commit_index(&CommitId::new(hash, root.clone()))
        })
        .collect();

    let providers = [(root, Arc::new(SyntheticProvider) as Arc<dyn LogProvider>)];
    let getter = CommitDetailsGetter::new(storage, providers, &notifier);
    let _repaint = getter.add_details_loaded_listener(|commits| {
        println!("   repaint: {} rows loaded", commits.len());
    });

    println!("1. First paint (nothing cached)");
    let placeholders = visible
        .iter()
        .filter(|&&c| getter.get_cached_data_or_placeholder(c).is_placeholder())
        .count();
    println!("   {} of {} rows show placeholders", placeholders, visible.len());

    println!("2. Loading visible rows");
    let details = getter.load_commits_data(&visible)?;
    for d in details.iter().take(3) {
        println!("   {}  {}", d.hash().short(), d.subject);
    }

    println!("3. Low-memory signal");
    notifier.notify_low_memory();
    let cached = getter.get_all_cached_data(visible.iter().copied()).len();
    println!("   {} rows still cached", cached);

    println!("4. Dispose");
    getter.dispose();
    println!("   listeners left on notifier: {}", notifier.listener_count());

    Ok(())
}
