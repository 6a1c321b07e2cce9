pub mod api;
pub mod engine;
pub mod index;

pub use api::{CheckStore, SimilarCheck, StoreStats, StoredCheck};
pub use engine::WalCheckStore;
pub use index::{normalize_claim, InMemoryIndex};
