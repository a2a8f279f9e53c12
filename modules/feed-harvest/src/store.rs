// In-memory dedup store for a single harvest run. First-seen wins: a record
// whose fingerprint is already present is dropped, never merged.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::post::PostRecord;

#[derive(Debug, Default)]
pub struct PostStore {
    posts: BTreeMap<String, PostRecord>,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every record whose fingerprint is not yet stored.
    /// Returns how many records were added.
    pub fn merge(&mut self, batch: impl IntoIterator<Item = PostRecord>) -> usize {
        let mut added = 0;
        for post in batch {
            if let Entry::Vacant(slot) = self.posts.entry(post.fingerprint.clone()) {
                slot.insert(post);
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.posts.contains_key(fingerprint)
    }

    /// Snapshot of the stored records, ordered by fingerprint.
    pub fn values(&self) -> Vec<PostRecord> {
        self.posts.values().cloned().collect()
    }

    pub fn into_values(self) -> Vec<PostRecord> {
        self.posts.into_values().collect()
    }
}
