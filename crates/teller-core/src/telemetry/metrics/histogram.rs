//! Histogram metrics - distribution tracking

use super::{Exposition, format_labels, write_header};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;

/// Snapshot of one histogram series
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistogramData {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    /// `(upper bound, cumulative count)`
    pub buckets: Vec<(f64, u64)>,
}

impl HistogramData {
    fn empty(bounds: &[f64]) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::MAX,
            max: f64::MIN,
            buckets: bounds.iter().map(|b| (*b, 0)).collect(),
        }
    }

    fn observe(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        for (bound, count) in &mut self.buckets {
            if value <= *bound {
                *count += 1;
            }
        }
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Histogram with a fixed set of label names
#[derive(Debug)]
pub struct LabeledHistogram<const N: usize> {
    name: String,
    description: String,
    label_names: [String; N],
    bounds: Vec<f64>,
    series: RwLock<BTreeMap<[String; N], HistogramData>>,
}

impl<const N: usize> LabeledHistogram<N> {
    pub fn with_buckets(
        name: impl Into<String>,
        description: impl Into<String>,
        label_names: [&str; N],
        bounds: &[f64],
    ) -> Self {
        let mut bounds = bounds.to_vec();
        bounds.sort_by(|a, b| a.total_cmp(b));
        Self {
            name: name.into(),
            description: description.into(),
            label_names: label_names.map(str::to_string),
            bounds,
            series: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn observe(&self, labels: [&str; N], value: f64) {
        let key = labels.map(str::to_string);
        self.series
            .write()
            .entry(key)
            .or_insert_with(|| HistogramData::empty(&self.bounds))
            .observe(value);
    }

    /// Snapshot for one label combination; min/max are 0 when empty
    pub fn get_data(&self, labels: [&str; N]) -> HistogramData {
        let key = labels.map(str::to_string);
        match self.series.read().get(&key) {
            Some(data) => data.clone(),
            None => {
                let mut data = HistogramData::empty(&self.bounds);
                data.min = 0.0;
                data.max = 0.0;
                data
            }
        }
    }
}

impl<const N: usize> Exposition for LabeledHistogram<N> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_prometheus(&self, out: &mut String) {
        write_header(out, &self.name, &self.description, "histogram");
        for (labels, data) in self.series.read().iter() {
            for (bound, count) in &data.buckets {
                let le = bound.to_string();
                out.push_str(&format!(
                    "{}_bucket{} {}\n",
                    self.name,
                    format_labels(&self.label_names, labels, Some(("le", &le))),
                    count
                ));
            }
            out.push_str(&format!(
                "{}_bucket{} {}\n",
                self.name,
                format_labels(&self.label_names, labels, Some(("le", "+Inf"))),
                data.count
            ));
            let plain = format_labels(&self.label_names, labels, None);
            out.push_str(&format!("{}_sum{} {}\n", self.name, plain, data.sum));
            out.push_str(&format!("{}_count{} {}\n", self.name, plain, data.count));
        }
    }
}
