use std::collections::BTreeSet;

use super::model::ReferenceSet;
use crate::error::{Result, UnmixError};
use crate::options::FitOptions;

// ---------------------------------------------------------------------------
// Selection: which references take part in a fit, and which are fixed
// ---------------------------------------------------------------------------

/// References chosen for one fit, in `ReferenceSet` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Positions in the `ReferenceSet`.
    pub indices: Vec<usize>,
    /// Parallel to `indices`: `Some(m)` when the multiplier is fixed.
    pub fixed: Vec<Option<f64>>,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Positions within the selection whose multiplier is solved for.
    pub fn free_columns(&self) -> Vec<usize> {
        (0..self.len()).filter(|&c| self.fixed[c].is_none()).collect()
    }
}

/// Resolve the reference subset and manual multipliers against a set.
///
/// * No subset → every reference is selected.
/// * A subset id missing from the set → `Config`.
/// * A manual multiplier for an id that is missing or not selected → `Config`.
/// * Nothing selected → `Config`.
pub fn select_references(references: &ReferenceSet, opts: &FitOptions) -> Result<Selection> {
    let subset: Option<BTreeSet<&str>> = match &opts.reference_subset {
        Some(ids) => {
            for id in ids {
                if !references.contains(id) {
                    return Err(UnmixError::config(format!(
                        "selected reference '{id}' is not in the reference set"
                    )));
                }
            }
            Some(ids.iter().map(String::as_str).collect())
        }
        None => None,
    };

    let indices: Vec<usize> = references
        .ids()
        .enumerate()
        .filter(|(_, id)| subset.as_ref().map_or(true, |s| s.contains(id)))
        .map(|(i, _)| i)
        .collect();

    if indices.is_empty() {
        return Err(UnmixError::config("no references selected for the fit"));
    }

    for id in opts.manual_multipliers.keys() {
        match references.position(id) {
            None => {
                return Err(UnmixError::config(format!(
                    "manual multiplier given for '{id}', which is not in the reference set"
                )));
            }
            Some(pos) if !indices.contains(&pos) => {
                return Err(UnmixError::config(format!(
                    "manual multiplier given for '{id}', which is not selected"
                )));
            }
            Some(_) => {}
        }
    }

    let ids: Vec<&str> = references.ids().collect();
    let fixed = indices
        .iter()
        .map(|&i| opts.manual_multipliers.get(ids[i]).copied())
        .collect();

    Ok(Selection { indices, fixed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{SpectrumBuffer, Unit};

    fn set() -> ReferenceSet {
        let sp = SpectrumBuffer::new(vec![1.0, 2.0], vec![0.0, 1.0], Unit::Absorbance).unwrap();
        ReferenceSet::try_from_pairs([("CO2", sp.clone()), ("H2O", sp.clone()), ("CH4", sp)])
            .unwrap()
    }

    #[test]
    fn selects_everything_by_default() {
        let sel = select_references(&set(), &FitOptions::default()).unwrap();
        assert_eq!(sel.indices, vec![0, 1, 2]);
        assert_eq!(sel.free_columns(), vec![0, 1, 2]);
    }

    #[test]
    fn subset_keeps_reference_set_order() {
        let opts = FitOptions {
            reference_subset: Some(vec!["CH4".into(), "CO2".into()]),
            ..Default::default()
        };
        let sel = select_references(&set(), &opts).unwrap();
        assert_eq!(sel.indices, vec![0, 2]);
    }

    #[test]
    fn unknown_subset_id_is_a_config_error() {
        let opts = FitOptions {
            reference_subset: Some(vec!["NH3".into()]),
            ..Default::default()
        };
        assert!(matches!(select_references(&set(), &opts), Err(UnmixError::Config(_))));
    }

    #[test]
    fn manual_multipliers_mark_fixed_columns() {
        let mut opts = FitOptions::default();
        opts.manual_multipliers.insert("H2O".into(), 0.18);
        let sel = select_references(&set(), &opts).unwrap();
        assert_eq!(sel.fixed, vec![None, Some(0.18), None]);
        assert_eq!(sel.free_columns(), vec![0, 2]);
    }

    #[test]
    fn manual_multiplier_for_unknown_id_is_a_config_error() {
        let mut opts = FitOptions::default();
        opts.manual_multipliers.insert("O3".into(), 0.02);
        assert!(matches!(select_references(&set(), &opts), Err(UnmixError::Config(_))));
    }

    #[test]
    fn manual_multiplier_outside_subset_is_a_config_error() {
        let mut opts = FitOptions {
            reference_subset: Some(vec!["CO2".into()]),
            ..Default::default()
        };
        opts.manual_multipliers.insert("H2O".into(), 0.1);
        assert!(select_references(&set(), &opts).is_err());
    }
}
