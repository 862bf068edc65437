//! Counter metrics - monotonically increasing values

use super::{Exposition, format_labels, write_header};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Counter with a fixed set of label names, one series per label combination
#[derive(Debug)]
pub struct LabeledCounter<const N: usize> {
    name: String,
    description: String,
    label_names: [String; N],
    series: RwLock<BTreeMap<[String; N], u64>>,
}

impl<const N: usize> LabeledCounter<N> {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        label_names: [&str; N],
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            label_names: label_names.map(str::to_string),
            series: RwLock::new(BTreeMap::new()),
        }
    }

    /// Increment counter for given labels
    pub fn inc(&self, labels: [&str; N]) {
        self.inc_by(labels, 1);
    }

    pub fn inc_by(&self, labels: [&str; N], n: u64) {
        let key = labels.map(str::to_string);
        *self.series.write().entry(key).or_insert(0) += n;
    }

    /// Value for one label combination (0 when never incremented)
    pub fn get(&self, labels: [&str; N]) -> u64 {
        let key = labels.map(str::to_string);
        self.series.read().get(&key).copied().unwrap_or(0)
    }

    /// Sum across all series
    pub fn total(&self) -> u64 {
        self.series.read().values().sum()
    }
}

impl<const N: usize> Exposition for LabeledCounter<N> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_prometheus(&self, out: &mut String) {
        write_header(out, &self.name, &self.description, "counter");
        for (labels, value) in self.series.read().iter() {
            out.push_str(&format!(
                "{}{} {}\n",
                self.name,
                format_labels(&self.label_names, labels, None),
                value
            ));
        }
    }
}
