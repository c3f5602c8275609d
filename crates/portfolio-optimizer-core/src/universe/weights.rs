use serde::{Deserialize, Serialize};

use crate::types::{Fraction, Percent};

/// Raw percent weights, one per asset, each clamped to [0, 100].
///
/// Raw weights need not sum to 100; [`normalized`](Self::normalized) turns
/// them into fractions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct WeightVector {
    raw: Vec<Percent>,
}

impl WeightVector {
    pub fn new(raw: Vec<Percent>) -> Self {
        Self {
            raw: raw.into_iter().map(clamp_weight).collect(),
        }
    }

    pub fn zeros(n: usize) -> Self {
        Self { raw: vec![0.0; n] }
    }

    /// 100/n on every asset.
    pub fn equal(n: usize) -> Self {
        if n == 0 {
            return Self::default();
        }
        Self {
            raw: vec![100.0 / n as f64; n],
        }
    }

    /// Build from fractions summing to 1 (solver output).
    pub fn from_fractions(fractions: &[Fraction]) -> Self {
        Self::new(fractions.iter().map(|w| w * 100.0).collect())
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn raw(&self) -> &[Percent] {
        &self.raw
    }

    pub fn get(&self, idx: usize) -> Option<Percent> {
        self.raw.get(idx).copied()
    }

    pub fn set(&mut self, idx: usize, value: Percent) {
        if let Some(slot) = self.raw.get_mut(idx) {
            *slot = clamp_weight(value);
        }
    }

    pub fn total(&self) -> Percent {
        self.raw.iter().sum()
    }

    /// raw / sum(raw), or all zeros when the sum is zero.
    pub fn normalized(&self) -> Vec<Fraction> {
        let total = self.total();
        if total <= 0.0 {
            return vec![0.0; self.raw.len()];
        }
        self.raw.iter().map(|w| w / total).collect()
    }

    /// Normalized percent weights rounded for display (ERC and frontier picks
    /// are applied at one decimal place).
    pub fn rounded(&self, decimals: u32) -> Vec<Percent> {
        let scale = 10f64.powi(decimals as i32);
        self.normalized()
            .iter()
            .map(|w| (w * 100.0 * scale).round() / scale)
            .collect()
    }

    pub(crate) fn insert(&mut self, idx: usize, value: Percent) {
        self.raw.insert(idx, clamp_weight(value));
    }

    pub(crate) fn remove(&mut self, idx: usize) -> Percent {
        self.raw.remove(idx)
    }
}

impl From<Vec<f64>> for WeightVector {
    fn from(raw: Vec<f64>) -> Self {
        WeightVector::new(raw)
    }
}

impl From<WeightVector> for Vec<f64> {
    fn from(w: WeightVector) -> Self {
        w.raw
    }
}

fn clamp_weight(w: Percent) -> Percent {
    if w.is_nan() {
        0.0
    } else {
        w.clamp(0.0, 100.0)
    }
}
