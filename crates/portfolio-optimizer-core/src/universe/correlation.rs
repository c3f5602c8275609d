use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::EngineResult;

const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Square, symmetric correlation matrix with a unit diagonal.
///
/// Row/column `i` always refers to asset `i` of the owning universe, so the
/// only way to change its size is through [`push_asset`](Self::push_asset)
/// and [`remove_asset`](Self::remove_asset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct CorrelationMatrix {
    rows: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Build from raw rows, validating shape, symmetry, diagonal and range.
    pub fn new(rows: Vec<Vec<f64>>) -> EngineResult<Self> {
        validate_rows(&rows)?;
        Ok(Self { rows })
    }

    /// Skip validation for compile-time data known to be well formed.
    pub(crate) fn from_trusted(rows: Vec<Vec<f64>>) -> Self {
        debug_assert!(validate_rows(&rows).is_ok());
        Self { rows }
    }

    /// n x n identity (uncorrelated assets).
    pub fn identity(n: usize) -> Self {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        Self { rows }
    }

    /// n x n matrix with every off-diagonal entry equal to `rho`.
    pub fn uniform(n: usize, rho: f64) -> Self {
        let rho = rho.clamp(-1.0, 1.0);
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { rho }).collect())
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.rows[i][j]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Symmetric edit. Values are clamped into [-1, 1]; the diagonal stays 1.
    pub fn set(&mut self, i: usize, j: usize, value: f64) -> EngineResult<()> {
        let n = self.len();
        if i >= n || j >= n {
            return Err(EngineError::invalid(
                "correlation",
                format!("index ({i}, {j}) out of range for {n} assets"),
            ));
        }
        if !value.is_finite() {
            return Err(EngineError::invalid("correlation", "value must be finite"));
        }
        if i == j {
            return Ok(());
        }
        let v = value.clamp(-1.0, 1.0);
        self.rows[i][j] = v;
        self.rows[j][i] = v;
        Ok(())
    }

    /// Append a row and column for a new asset.
    pub fn push_asset(&mut self, default_rho: f64) {
        let rho = default_rho.clamp(-1.0, 1.0);
        for row in &mut self.rows {
            row.push(rho);
        }
        let n = self.rows.len();
        let mut new_row = vec![rho; n + 1];
        new_row[n] = 1.0;
        self.rows.push(new_row);
    }

    /// Drop the row and column of asset `idx`.
    pub fn remove_asset(&mut self, idx: usize) -> EngineResult<()> {
        if idx >= self.len() {
            return Err(EngineError::invalid(
                "correlation",
                format!("index {idx} out of range for {} assets", self.len()),
            ));
        }
        self.rows.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        Ok(())
    }

    /// Sub-matrix over the given indices, in the given order.
    pub fn select(&self, indices: &[usize]) -> Vec<Vec<f64>> {
        indices
            .iter()
            .map(|&i| indices.iter().map(|&j| self.rows[i][j]).collect())
            .collect()
    }

    /// Cholesky test with a small diagonal jitter. User-edited correlations
    /// are not guaranteed to be PSD, in which case portfolio variance can go
    /// negative and is floored at zero.
    pub fn is_positive_semidefinite(&self) -> bool {
        let n = self.len();
        let jitter = 1e-10;
        let mut l = vec![vec![0.0_f64; n]; n];
        for i in 0..n {
            for j in 0..=i {
                let mut sum = self.rows[i][j];
                for k in 0..j {
                    sum -= l[i][k] * l[j][k];
                }
                if i == j {
                    let d = sum + jitter;
                    if d < 0.0 {
                        return false;
                    }
                    l[i][j] = d.sqrt();
                } else if l[j][j] > 0.0 {
                    l[i][j] = sum / l[j][j];
                } else {
                    l[i][j] = 0.0;
                }
            }
        }
        true
    }
}

impl TryFrom<Vec<Vec<f64>>> for CorrelationMatrix {
    type Error = EngineError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        CorrelationMatrix::new(rows)
    }
}

impl From<CorrelationMatrix> for Vec<Vec<f64>> {
    fn from(m: CorrelationMatrix) -> Self {
        m.rows
    }
}

fn validate_rows(rows: &[Vec<f64>]) -> EngineResult<()> {
    let n = rows.len();
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n {
            return Err(EngineError::invalid(
                "correlation",
                format!("Row {} has {} columns, expected {}", i, row.len(), n),
            ));
        }
    }
    for i in 0..n {
        if (rows[i][i] - 1.0).abs() > SYMMETRY_TOLERANCE {
            return Err(EngineError::invalid(
                "correlation",
                format!("Diagonal entry [{i},{i}] must be 1.0, got {}", rows[i][i]),
            ));
        }
        for j in 0..n {
            let v = rows[i][j];
            if !v.is_finite() || !(-1.0..=1.0).contains(&v) {
                return Err(EngineError::invalid(
                    "correlation",
                    format!("Entry [{i},{j}]={v} outside [-1, 1]"),
                ));
            }
            if j > i && (v - rows[j][i]).abs() > SYMMETRY_TOLERANCE {
                return Err(EngineError::invalid(
                    "correlation",
                    format!("Not symmetric: [{},{}]={} != [{},{}]={}", i, j, v, j, i, rows[j][i]),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rejects_asymmetric() {
        let rows = vec![vec![1.0, 0.3], vec![0.2, 1.0]];
        assert!(CorrelationMatrix::new(rows).is_err());
    }

    #[test]
    fn test_rejects_non_unit_diagonal() {
        let rows = vec![vec![0.9, 0.3], vec![0.3, 1.0]];
        assert!(CorrelationMatrix::new(rows).is_err());
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let rows = vec![vec![1.0, 0.3, 0.1], vec![0.3, 1.0]];
        assert!(CorrelationMatrix::new(rows).is_err());
    }

    #[test]
    fn test_set_is_symmetric_and_clamped() {
        let mut m = CorrelationMatrix::identity(3);
        m.set(0, 2, 1.7).unwrap();
        assert_eq!(m.get(0, 2), 1.0);
        assert_eq!(m.get(2, 0), 1.0);
        m.set(1, 1, 0.2).unwrap();
        assert_eq!(m.get(1, 1), 1.0);
    }

    #[test]
    fn test_push_then_remove_restores() {
        let original = CorrelationMatrix::new(vec![
            vec![1.0, 0.4, -0.2],
            vec![0.4, 1.0, 0.1],
            vec![-0.2, 0.1, 1.0],
        ])
        .unwrap();
        let mut m = original.clone();
        m.push_asset(0.10);
        assert_eq!(m.len(), 4);
        assert_eq!(m.get(3, 3), 1.0);
        assert_eq!(m.get(1, 3), 0.10);
        assert_eq!(m.get(3, 1), 0.10);
        m.remove_asset(3).unwrap();
        assert_eq!(m, original);
    }

    #[test]
    fn test_psd_detection() {
        assert!(CorrelationMatrix::uniform(4, 0.3).is_positive_semidefinite());
        let bad = CorrelationMatrix::new(vec![
            vec![1.0, 0.9, -0.9],
            vec![0.9, 1.0, 0.9],
            vec![-0.9, 0.9, 1.0],
        ])
        .unwrap();
        assert!(!bad.is_positive_semidefinite());
    }

    #[test]
    fn test_serde_validates() {
        let ok: CorrelationMatrix = serde_json::from_str("[[1.0, 0.5], [0.5, 1.0]]").unwrap();
        assert_eq!(ok.len(), 2);
        let bad: Result<CorrelationMatrix, _> = serde_json::from_str("[[1.0, 0.5], [0.4, 1.0]]");
        assert!(bad.is_err());
    }
}
