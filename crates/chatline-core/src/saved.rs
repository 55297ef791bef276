//! Ordered set of saved assistant message contents.

use serde::{Deserialize, Serialize};

/// Content strings the user marked as saved, in insertion order.
///
/// Serialized as a plain JSON array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SavedSet {
    entries: Vec<String>,
}

impl From<Vec<String>> for SavedSet {
    fn from(entries: Vec<String>) -> Self {
        Self::from_entries(entries)
    }
}

impl From<SavedSet> for Vec<String> {
    fn from(set: SavedSet) -> Self {
        set.entries
    }
}

impl SavedSet {
    /// Build a set from stored entries, dropping duplicates.
    pub fn from_entries(entries: impl IntoIterator<Item = String>) -> Self {
        let mut set = Self::default();
        for entry in entries {
            set.insert(entry);
        }
        set
    }

    /// Record `content`; returns false when it was already present.
    pub fn insert(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        if self.contains(&content) {
            return false;
        }
        self.entries.push(content);
        true
    }

    pub fn contains(&self, content: &str) -> bool {
        self.entries.iter().any(|entry| entry == content)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::SavedSet;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_is_idempotent() {
        let mut saved = SavedSet::default();
        assert!(saved.insert("Hi there"));
        assert!(!saved.insert("Hi there"));
        assert_eq!(saved.len(), 1);
        assert!(saved.contains("Hi there"));
    }

    #[test]
    fn duplicate_stored_entries_collapse() {
        let saved: SavedSet = serde_json::from_str(r#"["a","b","a"]"#).expect("decode");
        assert_eq!(saved.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(serde_json::to_string(&saved).expect("encode"), r#"["a","b"]"#);
    }
}
