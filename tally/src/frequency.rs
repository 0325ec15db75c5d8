use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Occurrence counts keyed by hashtag text or language code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyTable {
    counts: HashMap<String, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        FrequencyTable::default()
    }

    pub fn add(&mut self, key: impl Into<String>) {
        self.add_n(key, 1);
    }

    pub fn add_n(&mut self, key: impl Into<String>, n: u64) {
        *self.counts.entry(key.into()).or_insert(0) += n;
    }

    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Folds `other` into `self` by summing counts per key.
    pub fn merge(&mut self, other: FrequencyTable) {
        if self.counts.len() < other.counts.len() {
            let mine = std::mem::replace(&mut self.counts, other.counts);
            for (key, n) in mine {
                *self.counts.entry(key).or_insert(0) += n;
            }
            return;
        }
        for (key, n) in other.counts {
            *self.counts.entry(key).or_insert(0) += n;
        }
    }

    /// Returns the `n` highest-count entries, ordered by count descending and
    /// then by key ascending.
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        if n == 0 {
            return vec![];
        }
        let mut entries: Vec<(&String, u64)> = self.counts.iter().map(|(k, v)| (k, *v)).collect();
        if entries.len() > n {
            entries.select_nth_unstable_by(n - 1, rank_order);
            entries.truncate(n);
        }
        entries.sort_unstable_by(rank_order);
        entries
            .into_iter()
            .map(|(key, count)| (key.clone(), count))
            .collect()
    }
}

fn rank_order(a: &(&String, u64), b: &(&String, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

impl<K: Into<String>> FromIterator<K> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut table = FrequencyTable::new();
        table.extend(iter);
        table
    }
}

impl<K: Into<String>> Extend<K> for FrequencyTable {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.add(key);
        }
    }
}

/// The two tables every participant accumulates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tallies {
    pub hashtags: FrequencyTable,
    pub languages: FrequencyTable,
}

impl Tallies {
    pub fn new() -> Self {
        Tallies::default()
    }

    pub fn merge(&mut self, other: Tallies) {
        self.hashtags.merge(other.hashtags);
        self.languages.merge(other.languages);
    }
}
