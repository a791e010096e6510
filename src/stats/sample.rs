use std::collections::BTreeMap;

/// Sample collection keyed by trial index or source line.
///
/// Observations for a key keep their insertion order. Keys iterate in
/// ascending order.
#[derive(Clone, Debug)]
pub struct SampleStore<K> {
    samples: BTreeMap<K, Vec<f64>>,
}

impl<K> Default for SampleStore<K> {
    #[inline]
    fn default() -> Self {
        Self { samples: BTreeMap::new() }
    }
}

impl<K: Ord> SampleStore<K> {
    /// Appends one observation for `key`.
    #[inline]
    pub fn push(&mut self, key: K, value: f64) {
        self.samples.entry(key).or_default().push(value);
    }

    /// Returns the observations for `key`.
    pub fn get(&self, key: &K) -> Option<&[f64]> {
        self.samples.get(key).map(Vec::as_slice)
    }

    /// Iterates over keys with at least one observation, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[f64])> {
        self.samples.iter().filter(|(_, values)| !values.is_empty()).map(|(k, v)| (k, v.as_slice()))
    }

    /// The number of keys with at least one observation.
    pub fn key_count(&self) -> usize {
        self.iter().count()
    }

    /// The number of observations across all keys.
    pub fn sample_count(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    /// All observations in key order.
    pub fn values(&self) -> Vec<f64> {
        self.samples.values().flatten().copied().collect()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
