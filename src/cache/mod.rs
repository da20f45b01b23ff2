//! Whole-response page cache.
//!
//! Rendered pages of the cached routes are stored verbatim for a fixed time
//! window. Data mutations never invalidate them: a new or deleted post shows up
//! on a cached page only once the window elapses or [`PageCache::clear`] runs.

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::PageCacheConfig;
pub use keys::{PageKey, Viewer};
pub use middleware::{PageCacheState, page_cache_layer, should_store_response};
pub use store::{CachedResponse, PageCache};
