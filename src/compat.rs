//! Backward-compatible resolution of feature naming and geometry variables
//!
//! Modern history files list the auxiliary variables of a feature axis in the
//! `coordinates` attribute of each data variable. Older files do not, and the
//! variable names then follow fixed per-category conventions.

use crate::data_source::ArraySource;
use crate::feature::FeatureCategory;

/// Auxiliary variables picked out of a `coordinates` attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateSelection {
    pub name: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

impl CoordinateSelection {
    /// Split a space-separated `coordinates` value. Each slot is only filled
    /// when exactly one entry qualifies for it.
    pub fn from_attribute(coordinates: &str) -> Self {
        let entries: Vec<&str> = coordinates.split_whitespace().collect();
        Self {
            name: single_entry(&entries, |e| !e.contains('x') && !e.contains('y')),
            x: single_entry(&entries, |e| e.contains('x') && !e.contains('y')),
            y: single_entry(&entries, |e| e.contains('y') && !e.contains('x')),
        }
    }

    pub fn geometry(&self) -> Option<(String, String)> {
        Some((self.x.clone()?, self.y.clone()?))
    }
}

fn single_entry(entries: &[&str], pred: impl Fn(&str) -> bool) -> Option<String> {
    let mut hits = entries.iter().filter(|e| pred(e.to_lowercase().as_str()));
    match (hits.next(), hits.next()) {
        (Some(hit), None) => Some(hit.to_string()),
        _ => None,
    }
}

/// Name of the variable holding the feature names of `dimension`.
///
/// Uses the `coordinates` attribute when it singles out a naming variable and
/// falls back to the legacy table of the axis category otherwise. With two
/// legacy candidates the first that exists in the file wins.
pub fn resolve_name_variable(
    dimension: &str,
    coordinates: Option<&str>,
    source: &dyn ArraySource,
) -> Option<String> {
    if let Some(name) = coordinates.and_then(|c| CoordinateSelection::from_attribute(c).name) {
        return Some(name);
    }

    let candidates = FeatureCategory::from_dimension_name(dimension)?.legacy_name_variables();
    match candidates {
        [only] => Some(only.to_string()),
        _ => candidates
            .iter()
            .find(|c| source.variable(c).is_some())
            .map(|c| c.to_string()),
    }
}

/// Names of the x and y variables holding the geometry of `dimension`.
///
/// Legacy defaults are only returned when both exist in the file.
pub fn resolve_geometry_variables(
    dimension: &str,
    coordinates: Option<&str>,
    source: &dyn ArraySource,
) -> Option<(String, String)> {
    if let Some(pair) = coordinates.and_then(|c| CoordinateSelection::from_attribute(c).geometry()) {
        return Some(pair);
    }

    let (x, y) = FeatureCategory::from_dimension_name(dimension)?.legacy_geometry_variables()?;
    if source.variable(x).is_some() && source.variable(y).is_some() {
        Some((x.to_string(), y.to_string()))
    } else {
        None
    }
}
