pub mod interner;
pub mod shard;

pub use interner::KeyInterner;
pub use shard::{ShardSelector, split_capacity};
