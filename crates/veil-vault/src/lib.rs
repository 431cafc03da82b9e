//! Veil Vault — encrypted, expiring storage of token mappings.
//!
//! `MappingVault` seals each session's token -> value map under a key
//! derived from an external master key and stores it in a `KvStore`
//! (`MemoryStore` in-process, `RedisStore` for shared deployments).

pub mod crypto;
pub mod redis_store;
pub mod store;
pub mod vault;

pub use crypto::MasterKey;
pub use redis_store::RedisStore;
pub use store::{KvStore, MemoryStore, StoreError};
pub use vault::{MappingRecord, MappingVault};
