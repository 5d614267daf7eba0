//! Accumulated feature tensors
//!
//! Embeddings are heavy relative to the sample metadata in the snapshot, so
//! they live outside it, keyed by class id and index-parallel with
//! `Dataset.samples`. The recorder appends, sample removal trims, training
//! reads the whole set.

use crate::backends::Embedding;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct FeatureStore {
    inner: Mutex<HashMap<Uuid, Vec<Embedding>>>,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, class_id: Uuid, embedding: Embedding) {
        self.inner.lock().entry(class_id).or_default().push(embedding);
    }

    /// Remove several indices at once, keeping the store parallel with the
    /// sample list. Indices refer to positions before any of the removals.
    pub fn remove_many(&self, class_id: Uuid, indices: &[usize]) {
        let mut inner = self.inner.lock();
        if let Some(embeddings) = inner.get_mut(&class_id) {
            let mut sorted: Vec<usize> = indices.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            for index in sorted.into_iter().rev() {
                if index < embeddings.len() {
                    embeddings.remove(index);
                }
            }
        }
    }

    pub fn clear_class(&self, class_id: Uuid) {
        self.inner.lock().remove(&class_id);
    }

    pub fn clear_all(&self) {
        self.inner.lock().clear();
    }

    pub fn class_len(&self, class_id: Uuid) -> usize {
        self.inner.lock().get(&class_id).map_or(0, Vec::len)
    }

    pub fn total_examples(&self) -> usize {
        self.inner.lock().values().map(Vec::len).sum()
    }

    /// Flatten into (samples, labels) for fitting. Labels are indices into
    /// the given class order.
    pub fn training_set(&self, class_order: &[Uuid]) -> (Vec<Embedding>, Vec<usize>) {
        let inner = self.inner.lock();
        let mut samples = Vec::new();
        let mut labels = Vec::new();
        for (label, class_id) in class_order.iter().enumerate() {
            if let Some(embeddings) = inner.get(class_id) {
                for embedding in embeddings {
                    samples.push(embedding.clone());
                    labels.push(label);
                }
            }
        }
        (samples, labels)
    }
}
