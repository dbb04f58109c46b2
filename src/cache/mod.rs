//! The three secret caches (§4.3-4.5), each with its own freshness policy
//! but the same ownership discipline: one `ArcSwap<Entry>` per domain,
//! written only by that domain's worker, read by publishing the new `Arc`
//! before the old one can be dropped.

mod dynamic;
mod kv;
mod static_db;

pub use dynamic::{DynamicDbCache, DynamicDbEntry};
pub use kv::{KvCache, KvEntry};
pub use static_db::{StaticDbCache, StaticDbEntry};
