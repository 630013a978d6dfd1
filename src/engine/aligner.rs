//! Feature alignment: raw parameter record → fixed-width encoded row
//!
//! Reproduces the training-time encoding exactly. Numeric parameters are
//! copied into their column, categorical parameters set one column of their
//! one-hot block. A level never seen in training leaves the whole block at
//! zero, which is how the model was trained to see "none of the above".

use std::collections::HashSet;

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::model::{FeatureLayout, ParamKind};
use crate::types::{EncodedMatrix, ParamRecord};

/// Encodes raw records into the artifact's column layout.
#[derive(Debug, Clone)]
pub struct FeatureAligner<'a> {
    layout: &'a FeatureLayout,
    optional: HashSet<String>,
}

impl<'a> FeatureAligner<'a> {
    /// Aligner in which every artifact parameter is required.
    pub fn new(layout: &'a FeatureLayout) -> Self {
        Self {
            layout,
            optional: HashSet::new(),
        }
    }

    /// Mark parameters that may be absent (their columns stay zero).
    #[must_use]
    pub fn with_optional<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional.extend(names.into_iter().map(Into::into));
        self
    }

    /// Layout this aligner encodes into.
    pub const fn layout(&self) -> &'a FeatureLayout {
        self.layout
    }

    /// Encoded width.
    pub fn width(&self) -> usize {
        self.layout.width()
    }

    /// Encode one record.
    ///
    /// # Errors
    /// `Configuration` when a required parameter is absent, or a numeric
    /// parameter is not a finite number.
    pub fn align(&self, record: &ParamRecord) -> Result<Vec<f64>> {
        let mut row = vec![0.0; self.layout.width()];
        self.fill_row(record, &mut row)?;
        Ok(row)
    }

    /// Encode many records into one matrix, in input order.
    pub fn align_batch(&self, records: &[ParamRecord]) -> Result<EncodedMatrix> {
        let mut matrix = EncodedMatrix::zeros(records.len(), self.layout.width());
        for (i, record) in records.iter().enumerate() {
            self.fill_row(record, matrix.row_mut(i))?;
        }
        Ok(matrix)
    }

    /// Encode `record` into a zeroed `row` of layout width.
    pub fn fill_row(&self, record: &ParamRecord, row: &mut [f64]) -> Result<()> {
        if row.len() != self.layout.width() {
            return Err(EngineError::config(format!(
                "row buffer has {} columns, layout has {}",
                row.len(),
                self.layout.width()
            )));
        }

        for slot in self.layout.slots() {
            let Some(value) = record.get(slot.name()) else {
                if self.optional.contains(slot.name()) {
                    continue;
                }
                return Err(EngineError::config(format!(
                    "required parameter '{}' is missing",
                    slot.name()
                )));
            };

            match slot.kind() {
                ParamKind::Numeric => {
                    let v = value.as_numeric().ok_or_else(|| {
                        EngineError::config(format!(
                            "parameter '{}' must be numeric, got '{value}'",
                            slot.name()
                        ))
                    })?;
                    if !v.is_finite() {
                        return Err(EngineError::config(format!(
                            "parameter '{}' must be finite, got {v}",
                            slot.name()
                        )));
                    }
                    row[slot.columns()[0]] = v;
                }
                ParamKind::Categorical => {
                    let level = value.as_level();
                    match slot.level_column(&level) {
                        Some(col) => row[col] = 1.0,
                        None => debug!(
                            parameter = slot.name(),
                            level = %level,
                            "Unseen categorical level, block left at zero"
                        ),
                    }
                }
            }
        }
        Ok(())
    }
}
