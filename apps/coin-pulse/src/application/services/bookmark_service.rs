//! Bookmarked symbols, persisted through the key-value store.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::application::ports::{KeyValueStore, StoreError, load_json_or_default, save_json};
use crate::domain::bookmarks::BookmarkSet;

/// Durable store key for the bookmark set.
pub const BOOKMARKS_KEY: &str = "bookmarkedCoins";

/// Loads, toggles and saves the bookmark set.
pub struct BookmarkService {
    store: Arc<dyn KeyValueStore>,
    bookmarks: RwLock<BookmarkSet>,
}

impl std::fmt::Debug for BookmarkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookmarkService")
            .field("bookmarks", &*self.bookmarks.read())
            .finish_non_exhaustive()
    }
}

impl BookmarkService {
    /// Load the persisted set. Absent or corrupt data reads as empty.
    #[must_use]
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let bookmarks = load_json_or_default(store.as_ref(), BOOKMARKS_KEY);
        Self {
            store,
            bookmarks: RwLock::new(bookmarks),
        }
    }

    /// Snapshot of the current set.
    #[must_use]
    pub fn bookmarks(&self) -> BookmarkSet {
        self.bookmarks.read().clone()
    }

    /// Whether `symbol` is bookmarked.
    #[must_use]
    pub fn is_bookmarked(&self, symbol: &str) -> bool {
        self.bookmarks.read().contains(symbol)
    }

    /// Flip `symbol` and persist. Returns whether it is now bookmarked.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the set could not be written. The in-memory
    /// set keeps the change.
    pub fn toggle(&self, symbol: &str) -> Result<bool, StoreError> {
        let mut bookmarks = self.bookmarks.write();
        let now_bookmarked = bookmarks.toggle(symbol);
        save_json(self.store.as_ref(), BOOKMARKS_KEY, &*bookmarks)?;
        tracing::debug!(symbol, bookmarked = now_bookmarked, "Bookmark toggled");
        Ok(now_bookmarked)
    }

    /// Re-read the persisted set, e.g. after another writer changed it.
    pub fn reload(&self) {
        *self.bookmarks.write() = load_json_or_default(self.store.as_ref(), BOOKMARKS_KEY);
    }
}
