use ndarray::Array2;

use crate::error::{CalibError, Result};
use crate::normalization::engine::NormalizationSolution;

/// In-memory representation of a local-normalization data document: the
/// `(A, B)` affine field computed by [`crate::normalization::engine`],
/// plus enough context to reapply it without re-running the solve.
#[derive(Clone, Debug)]
pub struct XnmlDocument {
    pub reference_image: String,
    pub target_image: String,
    pub normalization_scale: u32,
    pub reference_width: u32,
    pub reference_height: u32,
    /// ISO-8601 UTC, e.g. `2026-08-01T12:00:00Z`.
    pub creation_time: String,
    pub a: Vec<Array2<f64>>,
    pub b: Vec<Array2<f64>>,
}

impl XnmlDocument {
    /// Build a document from a solved [`NormalizationSolution`], widening
    /// the coefficient grids to `f64` for the on-disk payload.
    pub fn from_solution(
        solution: &NormalizationSolution,
        reference_image: impl Into<String>,
        target_image: impl Into<String>,
        creation_time: impl Into<String>,
    ) -> Self {
        Self {
            reference_image: reference_image.into(),
            target_image: target_image.into(),
            normalization_scale: solution.scale,
            reference_width: solution.reference_width,
            reference_height: solution.reference_height,
            creation_time: creation_time.into(),
            a: solution.a.iter().map(|m| m.mapv(f64::from)).collect(),
            b: solution.b.iter().map(|m| m.mapv(f64::from)).collect(),
        }
    }

    /// Validate the invariants checked on parse: positive scale, matching
    /// channel counts and per-channel shapes between `A` and `B`.
    pub fn validate(&self) -> Result<()> {
        if self.normalization_scale < 32 {
            return Err(CalibError::Xnml(format!(
                "normalization scale {} is below the minimum of 32",
                self.normalization_scale
            )));
        }
        if self.a.len() != self.b.len() {
            return Err(CalibError::Xnml(format!(
                "A has {} channels but B has {}",
                self.a.len(),
                self.b.len()
            )));
        }
        if self.a.is_empty() {
            return Err(CalibError::Xnml("document has no channels".to_string()));
        }
        for (a, b) in self.a.iter().zip(self.b.iter()) {
            if a.dim() != b.dim() {
                return Err(CalibError::Xnml(format!(
                    "A/B shape mismatch: {:?} vs {:?}",
                    a.dim(),
                    b.dim()
                )));
            }
        }
        Ok(())
    }

    pub fn channel_count(&self) -> usize {
        self.a.len()
    }
}
