use std::sync::{Arc, RwLock};

use crate::recognition::domain::embedding::FaceEmbedding;

/// One known identity sample: a label and the embedding of one face image.
/// A gallery may hold several entries per label.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileEntry {
    pub label: String,
    pub embedding: FaceEmbedding,
}

impl ProfileEntry {
    pub fn new(label: impl Into<String>, embedding: FaceEmbedding) -> Self {
        let label = label.into();
        debug_assert!(!label.is_empty(), "profile label must be non-empty");
        Self { label, embedding }
    }
}

/// Ordered, immutable collection of known (label, embedding) pairs.
///
/// Galleries are rebuilt wholesale and never mutated in place; see
/// [`SharedGallery`] for the publish discipline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileGallery {
    entries: Vec<ProfileEntry>,
}

impl ProfileGallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ProfileEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct labels, sorted.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.entries.iter().map(|e| e.label.clone()).collect();
        labels.sort();
        labels.dedup();
        labels
    }
}

/// Atomically swappable gallery snapshot.
///
/// Readers take cheap `Arc` snapshots and need no lock for matching;
/// `replace` publishes a fully built gallery so in-flight matches against
/// the old snapshot run to completion and no reader ever observes a
/// partially populated gallery.
#[derive(Debug, Default)]
pub struct SharedGallery {
    current: RwLock<Arc<ProfileGallery>>,
}

impl SharedGallery {
    pub fn new(gallery: ProfileGallery) -> Self {
        Self {
            current: RwLock::new(Arc::new(gallery)),
        }
    }

    pub fn snapshot(&self) -> Arc<ProfileGallery> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn replace(&self, gallery: ProfileGallery) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(gallery);
    }
}
