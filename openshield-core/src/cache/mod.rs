//! Two-tier caching
//!
//! [`ResponseCache`] holds exact request/response pairs; [`ContextCache`] holds
//! answers per conversation session and last user turn. Both fail open.

mod context;
mod error;
mod response;
mod store;

pub use context::{ContextCache, ContextKey};
pub use error::{CacheError, CacheResult};
pub use response::{fingerprint, ResponseCache};
pub use store::{KvStore, MemoryStore, RedisStore};
