//! Gauge metrics - values that can go up or down

use super::{Exposition, write_header};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unlabeled gauge holding an `f64` (stored as its bit pattern)
#[derive(Debug)]
pub struct Gauge {
    name: String,
    description: String,
    bits: AtomicU64,
}

impl Gauge {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn reset(&self) {
        self.set(0.0);
    }
}

impl Exposition for Gauge {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_prometheus(&self, out: &mut String) {
        write_header(out, &self.name, &self.description, "gauge");
        out.push_str(&format!("{} {}\n", self.name, self.get()));
    }
}
