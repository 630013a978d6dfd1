//! Feature layout: explicit mapping from original parameters to encoded columns
//!
//! Built once when the artifact is loaded. Numeric parameters own exactly the
//! column carrying their own name; categorical parameters own one dummy
//! column per trained-time level, named `<param>_<level>`. Every encoded
//! column belongs to exactly one original parameter, so attribution can be
//! collapsed without inspecting names on every call.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::error::{EngineError, Result};

/// Kind of an original parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Copied into a single encoded column
    Numeric,
    /// Expanded into a one-hot block
    Categorical,
}

/// Encoded columns owned by one original parameter.
#[derive(Debug, Clone)]
pub struct ParamSlot {
    name: String,
    kind: ParamKind,
    columns: Vec<usize>,
    /// level → column, categorical only
    levels: HashMap<String, usize>,
    level_order: Vec<String>,
}

impl ParamSlot {
    /// Original parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter kind.
    pub const fn kind(&self) -> ParamKind {
        self.kind
    }

    /// Encoded column indices owned by this parameter.
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Column of a categorical level, if it was seen in training.
    pub fn level_column(&self, level: &str) -> Option<usize> {
        self.levels.get(level).copied()
    }

    /// Trained-time levels in column order (empty for numeric).
    pub fn levels(&self) -> &[String] {
        &self.level_order
    }
}

/// Immutable encoded layout of a model artifact.
#[derive(Debug, Clone)]
pub struct FeatureLayout {
    columns: Vec<String>,
    slots: Vec<ParamSlot>,
    by_name: HashMap<String, usize>,
}

impl FeatureLayout {
    /// Build the layout from the artifact's column list and parameter names.
    ///
    /// `levels` optionally pins each categorical parameter's trained levels;
    /// without it levels are recovered from the `<param>_` column prefixes,
    /// the longest matching parameter name winning.
    ///
    /// # Errors
    /// `ArtifactSchema` when columns repeat, a numeric parameter has no
    /// column, a pinned level has no column, a name is both numeric and
    /// categorical, or a column belongs to no parameter.
    pub fn build(
        columns: &[String],
        numeric: &[String],
        categorical: &[String],
        levels: Option<&BTreeMap<String, Vec<String>>>,
    ) -> Result<Self> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(columns.len());
        for (i, c) in columns.iter().enumerate() {
            if index.insert(c.as_str(), i).is_some() {
                return Err(EngineError::schema(format!("duplicate encoded column '{c}'")));
            }
        }

        let mut seen_names = HashSet::new();
        for name in numeric.iter().chain(categorical) {
            if !seen_names.insert(name.as_str()) {
                return Err(EngineError::schema(format!(
                    "parameter '{name}' is listed more than once"
                )));
            }
        }

        let mut owner: Vec<Option<usize>> = vec![None; columns.len()];
        let mut slots = Vec::with_capacity(numeric.len() + categorical.len());

        for name in numeric {
            let col = *index.get(name.as_str()).ok_or_else(|| {
                EngineError::schema(format!("numeric parameter '{name}' has no encoded column"))
            })?;
            owner[col] = Some(slots.len());
            slots.push(ParamSlot {
                name: name.clone(),
                kind: ParamKind::Numeric,
                columns: vec![col],
                levels: HashMap::new(),
                level_order: Vec::new(),
            });
        }

        let first_categorical = slots.len();
        for name in categorical {
            slots.push(ParamSlot {
                name: name.clone(),
                kind: ParamKind::Categorical,
                columns: Vec::new(),
                levels: HashMap::new(),
                level_order: Vec::new(),
            });
        }

        if let Some(pinned) = levels {
            for (offset, name) in categorical.iter().enumerate() {
                let slot_idx = first_categorical + offset;
                let Some(param_levels) = pinned.get(name) else {
                    continue;
                };
                for level in param_levels {
                    let col_name = format!("{name}_{level}");
                    let col = *index.get(col_name.as_str()).ok_or_else(|| {
                        EngineError::schema(format!(
                            "level '{level}' of '{name}' has no encoded column '{col_name}'"
                        ))
                    })?;
                    if let Some(prev) = owner[col] {
                        return Err(EngineError::schema(format!(
                            "column '{col_name}' claimed by both '{}' and '{name}'",
                            slots[prev].name
                        )));
                    }
                    owner[col] = Some(slot_idx);
                }
            }
        }

        // Remaining columns: attribute by longest categorical prefix, skipping
        // parameters whose levels were pinned explicitly.
        for (col, col_name) in columns.iter().enumerate() {
            if owner[col].is_some() {
                continue;
            }
            let best = categorical
                .iter()
                .enumerate()
                .filter(|(_, name)| levels.map_or(true, |p| !p.contains_key(*name)))
                .filter(|(_, name)| {
                    col_name.len() > name.len() + 1
                        && col_name.starts_with(name.as_str())
                        && col_name.as_bytes()[name.len()] == b'_'
                })
                .max_by_key(|(_, name)| name.len());
            match best {
                Some((offset, _)) => owner[col] = Some(first_categorical + offset),
                None => {
                    return Err(EngineError::schema(format!(
                        "encoded column '{col_name}' is not derived from any original parameter"
                    )))
                }
            }
        }

        for (col, slot_idx) in owner.iter().enumerate() {
            if let Some(slot_idx) = *slot_idx {
                let slot = &mut slots[slot_idx];
                if slot.kind == ParamKind::Categorical {
                    let level = columns[col][slot.name.len() + 1..].to_string();
                    slot.columns.push(col);
                    slot.levels.insert(level.clone(), col);
                    slot.level_order.push(level);
                }
            }
        }

        for slot in &slots[first_categorical..] {
            if slot.columns.is_empty() {
                debug!(parameter = %slot.name, "Categorical parameter has no trained levels");
            }
        }

        let by_name = slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        Ok(Self {
            columns: columns.to_vec(),
            slots,
            by_name,
        })
    }

    /// Encoded column names in model order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Encoded width.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Parameter slots: numeric parameters first, then categorical, each in
    /// artifact order.
    pub fn slots(&self) -> &[ParamSlot] {
        &self.slots
    }

    /// Slot for a parameter name.
    pub fn slot(&self, name: &str) -> Option<&ParamSlot> {
        self.by_name.get(name).map(|&i| &self.slots[i])
    }

    /// Kind of a parameter, if it exists.
    pub fn kind(&self, name: &str) -> Option<ParamKind> {
        self.slot(name).map(ParamSlot::kind)
    }

    /// Column index of a numeric parameter.
    pub fn numeric_column(&self, name: &str) -> Option<usize> {
        self.slot(name)
            .filter(|s| s.kind == ParamKind::Numeric)
            .map(|s| s.columns[0])
    }

    /// Original parameter names, numeric first.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(ParamSlot::name)
    }

    /// Index of an encoded column by name.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn infers_levels_from_prefixes() {
        let layout = FeatureLayout::build(
            &names(&["Pattern_A", "Pattern_B", "Pressure", "Steel_Code_S1", "Temp"]),
            &names(&["Temp", "Pressure"]),
            &names(&["Pattern", "Steel_Code"]),
            None,
        )
        .unwrap();

        assert_eq!(layout.width(), 5);
        assert_eq!(layout.numeric_column("Temp"), Some(4));
        let pattern = layout.slot("Pattern").unwrap();
        assert_eq!(pattern.columns(), &[0, 1]);
        assert_eq!(pattern.level_column("B"), Some(1));
        assert_eq!(layout.slot("Steel_Code").unwrap().level_column("S1"), Some(3));
    }

    #[test]
    fn longest_prefix_wins() {
        let layout = FeatureLayout::build(
            &names(&["Code_X", "Code_Type_Y"]),
            &[],
            &names(&["Code", "Code_Type"]),
            None,
        )
        .unwrap();
        assert_eq!(layout.slot("Code").unwrap().levels(), &["X".to_string()]);
        assert_eq!(layout.slot("Code_Type").unwrap().levels(), &["Y".to_string()]);
    }

    #[test]
    fn pinned_levels_resolve_ambiguity() {
        let mut pinned = BTreeMap::new();
        pinned.insert("Code".to_string(), vec!["Type_Y".to_string()]);
        let layout = FeatureLayout::build(
            &names(&["Code_Type_Y"]),
            &[],
            &names(&["Code", "Code_Type"]),
            Some(&pinned),
        )
        .unwrap();
        assert_eq!(layout.slot("Code").unwrap().level_column("Type_Y"), Some(0));
        assert!(layout.slot("Code_Type").unwrap().columns().is_empty());
    }

    #[test]
    fn orphan_column_is_schema_error() {
        let err = FeatureLayout::build(
            &names(&["Temp", "Mystery"]),
            &names(&["Temp"]),
            &[],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ArtifactSchema(_)));
    }

    #[test]
    fn missing_numeric_column_is_schema_error() {
        let err = FeatureLayout::build(&names(&["Temp"]), &names(&["Pressure"]), &[], None)
            .unwrap_err();
        assert!(matches!(err, EngineError::ArtifactSchema(_)));
    }
}
