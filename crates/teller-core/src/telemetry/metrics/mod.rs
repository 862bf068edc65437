//! Metric primitives with Prometheus text exposition

mod counter;
mod gauge;
mod histogram;

pub use counter::LabeledCounter;
pub use gauge::Gauge;
pub use histogram::{HistogramData, LabeledHistogram};

/// A metric that can write itself in Prometheus text format
pub trait Exposition: Send + Sync {
    fn name(&self) -> &str;

    fn write_prometheus(&self, out: &mut String);
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    out.push_str(&format!("# HELP {} {}\n# TYPE {} {}\n", name, help, name, kind));
}

/// `{a="x",b="y"}`, or empty when there are no labels
fn format_labels(names: &[String], values: &[String], extra: Option<(&str, &str)>) -> String {
    let mut pairs: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{}=\"{}\"", name, escape_label(value)))
        .collect();
    if let Some((name, value)) = extra {
        pairs.push(format!("{}=\"{}\"", name, value));
    }
    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
