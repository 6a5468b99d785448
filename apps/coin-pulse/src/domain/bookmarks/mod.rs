//! Bookmarked Symbol Set
//!
//! Membership only. The set never interprets the symbols it holds.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Persisted set of bookmarked trading pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkSet(BTreeSet<String>);

impl BookmarkSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `symbol` is bookmarked.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.0.contains(&normalize(symbol))
    }

    /// Add `symbol`. Returns `false` if it was already present.
    pub fn insert(&mut self, symbol: &str) -> bool {
        self.0.insert(normalize(symbol))
    }

    /// Remove `symbol`. Returns `false` if it was absent.
    pub fn remove(&mut self, symbol: &str) -> bool {
        self.0.remove(&normalize(symbol))
    }

    /// Flip membership and return the new state.
    pub fn toggle(&mut self, symbol: &str) -> bool {
        if self.remove(symbol) {
            false
        } else {
            self.insert(symbol)
        }
    }

    /// Bookmarked symbols in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of bookmarks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is bookmarked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for BookmarkSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(|s| normalize(s.as_ref())).collect())
    }
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_membership() {
        let mut set = BookmarkSet::new();
        assert!(set.toggle("btcusdt"));
        assert!(set.contains("BTCUSDT"));
        assert!(!set.toggle("BTCUSDT"));
        assert!(set.is_empty());
    }

    #[test]
    fn serializes_as_sorted_array() {
        let set: BookmarkSet = ["ethusdt", "BTCUSDT", "ETHUSDT"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"["BTCUSDT","ETHUSDT"]"#
        );
        let back: BookmarkSet = serde_json::from_str(r#"["BTCUSDT","ETHUSDT"]"#).unwrap();
        assert_eq!(back, set);
    }
}
