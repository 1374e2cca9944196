//! Feature association cache
//!
//! Maps the name of a feature axis to the ordered features on that axis. Names
//! come from `cf_role = timeseries_id` variables when the file has them and
//! from [`crate::compat`] otherwise; geometries come from CF geometry
//! containers or from legacy x/y variables. Bindings are memoized per axis
//! name until [`FeatureCache::invalidate`] is called.

use crate::catalog::{ArrayVariable, DataKind};
use crate::compat;
use crate::data_source::ArraySource;
use crate::feature::{Feature, FeatureCategory, Geometry};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const TIMESERIES_ID: &str = "timeseries_id";
pub const GEOMETRY_TYPE: &str = "geometry_type";
pub const NODE_COUNT: &str = "node_count";
pub const NODE_COORDINATES: &str = "node_coordinates";

/// Values at or above this are fill values in legacy geometry arrays.
pub const GEOMETRY_FILL_THRESHOLD: f64 = 9.969_209_968_386_869e36;

/// Features of one axis and the variables they were resolved from
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBinding {
    pub dimension: String,
    pub features: Vec<Arc<Feature>>,
    pub name_variable: Option<String>,
    pub geometry_variables: Option<(String, String)>,
}

impl FeatureBinding {
    fn unbound(dimension: &str) -> Self {
        Self {
            dimension: dimension.to_string(),
            features: Vec::new(),
            name_variable: None,
            geometry_variables: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }
}

#[derive(Debug, Default)]
pub struct FeatureCache {
    supplied: Vec<Arc<Feature>>,
    names_by_dimension: HashMap<String, Vec<String>>,
    name_variable_by_dimension: HashMap<String, String>,
    geometries_by_dimension: HashMap<String, Vec<Geometry>>,
    bindings: HashMap<String, Arc<FeatureBinding>>,
}

impl FeatureCache {
    /// Create a cache that reuses `supplied` features where names match.
    pub fn new(supplied: Vec<Arc<Feature>>) -> Self {
        Self {
            supplied,
            ..Self::default()
        }
    }

    /// Scan the file for timeseries ids and geometry containers.
    pub fn load(&mut self, source: &dyn ArraySource) {
        let variables = source.variables();
        for variable in &variables {
            if variable.cf_role() == Some(TIMESERIES_ID) {
                self.load_timeseries_ids(variable, source);
            }
            if variable.rank() == 0 && variable.attribute(GEOMETRY_TYPE).is_some() {
                self.load_geometry_container(variable, source);
            }
        }
    }

    /// Drop every memoized binding and everything read from the file. Caller
    /// supplied features are kept.
    pub fn invalidate(&mut self) {
        self.names_by_dimension.clear();
        self.name_variable_by_dimension.clear();
        self.geometries_by_dimension.clear();
        self.bindings.clear();
    }

    /// Whether feature names for `dimension` were found in the file.
    pub fn has_names(&self, dimension: &str) -> bool {
        self.names_by_dimension.contains_key(dimension)
    }

    pub fn name_variable(&self, dimension: &str) -> Option<&str> {
        self.name_variable_by_dimension
            .get(dimension)
            .map(String::as_str)
    }

    /// The memoized binding of `dimension`, without resolving anything.
    pub fn binding(&self, dimension: &str) -> Option<Arc<FeatureBinding>> {
        self.bindings.get(dimension).cloned()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Arc<FeatureBinding>> {
        self.bindings.values()
    }

    /// Whether the `coordinates` attribute of a variable refers to the naming
    /// variable recorded for `dimension`.
    pub fn is_mapped(&self, dimension: &str, coordinates: Option<&str>) -> bool {
        match (self.name_variable(dimension), coordinates) {
            (Some(name_variable), Some(coordinates)) => coordinates
                .split_whitespace()
                .any(|entry| entry.eq_ignore_ascii_case(name_variable)),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Resolve the features on `dimension`, or return the memoized binding.
    ///
    /// `coordinates` is the attribute of the first variable that asks for this
    /// axis. A binding that resolves no features is still memoized, so the
    /// warning about it is logged once per axis.
    pub fn get_or_create_features(
        &mut self,
        dimension: &str,
        coordinates: Option<&str>,
        source: &dyn ArraySource,
    ) -> Arc<FeatureBinding> {
        if let Some(binding) = self.bindings.get(dimension) {
            return Arc::clone(binding);
        }

        let binding = Arc::new(self.resolve(dimension, coordinates, source));
        self.bindings
            .insert(dimension.to_string(), Arc::clone(&binding));
        binding
    }

    fn resolve(
        &self,
        dimension: &str,
        coordinates: Option<&str>,
        source: &dyn ArraySource,
    ) -> FeatureBinding {
        let (names, name_variable) = if self.is_mapped(dimension, coordinates) {
            (
                self.names_by_dimension
                    .get(dimension)
                    .cloned()
                    .unwrap_or_default(),
                self.name_variable(dimension).map(str::to_string),
            )
        } else {
            if self.has_names(dimension) {
                warn!(
                    dimension,
                    "feature axis cannot be mapped to its names through the coordinates attribute, using legacy names"
                );
            }
            legacy_names(dimension, coordinates, source)
        };

        if names.is_empty() {
            warn!(dimension, "no feature names could be resolved, features are left empty");
            return FeatureBinding {
                name_variable,
                ..FeatureBinding::unbound(dimension)
            };
        }

        let category = match FeatureCategory::from_dimension_name(dimension) {
            Some(category) => category,
            None => {
                warn!(
                    dimension,
                    names = names.len(),
                    "feature axis does not belong to a known feature category, features are left unbound"
                );
                return FeatureBinding {
                    name_variable,
                    ..FeatureBinding::unbound(dimension)
                };
            }
        };

        let (geometries, geometry_variables) = match self.geometries_by_dimension.get(dimension) {
            Some(geometries) if geometries.len() == names.len() => (geometries.clone(), None),
            _ => match compat::resolve_geometry_variables(dimension, coordinates, source) {
                Some((x, y)) => (read_legacy_geometries(&x, &y, source), Some((x, y))),
                None => (Vec::new(), None),
            },
        };

        let kind = category.feature_kind();
        let features = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                if let Some(existing) = self.supplied.iter().find(|f| f.matches(name, kind)) {
                    return Arc::clone(existing);
                }
                let mut feature = Feature::new(name.clone(), kind);
                feature.geometry = geometries.get(i).cloned();
                feature.formula = category.formula();
                Arc::new(feature)
            })
            .collect::<Vec<_>>();

        debug!(
            dimension,
            features = features.len(),
            name_variable = ?name_variable,
            "bound features to axis"
        );

        FeatureBinding {
            dimension: dimension.to_string(),
            features,
            name_variable,
            geometry_variables,
        }
    }

    fn load_timeseries_ids(&mut self, variable: &ArrayVariable, source: &dyn ArraySource) {
        let textual = matches!(
            (variable.kind, variable.rank()),
            (DataKind::Char, 2) | (DataKind::Text, 1)
        );
        if !textual {
            warn!(variable = %variable.name, "timeseries_id variable is not a list of names, ignored");
            return;
        }

        match source.read_text(&variable.name) {
            Ok(names) => {
                let dimension = variable.dimensions[0].name.clone();
                self.name_variable_by_dimension
                    .insert(dimension.clone(), variable.name.clone());
                self.names_by_dimension.insert(dimension, names);
            }
            Err(e) => warn!(variable = %variable.name, error = %e, "could not read feature names"),
        }
    }

    fn load_geometry_container(&mut self, container: &ArrayVariable, source: &dyn ArraySource) {
        match read_geometry_container(container, source) {
            Ok((dimension, geometries)) => {
                self.geometries_by_dimension.insert(dimension, geometries);
            }
            Err(message) => warn!(
                variable = %container.name,
                "skipping geometry container: {}",
                message
            ),
        }
    }
}

fn legacy_names(
    dimension: &str,
    coordinates: Option<&str>,
    source: &dyn ArraySource,
) -> (Vec<String>, Option<String>) {
    match compat::resolve_name_variable(dimension, coordinates, source) {
        Some(variable) => match source.read_text(&variable) {
            Ok(names) => (names, Some(variable)),
            Err(e) => {
                warn!(dimension, variable = %variable, error = %e, "could not read feature names");
                (Vec::new(), Some(variable))
            }
        },
        None => (Vec::new(), None),
    }
}

/// Read the geometries described by a CF geometry container.
fn read_geometry_container(
    container: &ArrayVariable,
    source: &dyn ArraySource,
) -> std::result::Result<(String, Vec<Geometry>), String> {
    let geometry_type = container
        .attribute(GEOMETRY_TYPE)
        .unwrap_or_default()
        .to_lowercase();
    let count_variable = container
        .attribute(NODE_COUNT)
        .ok_or("missing node_count attribute")?;
    let coordinates = container
        .attribute(NODE_COORDINATES)
        .ok_or("missing node_coordinates attribute")?;

    let selection = compat::CoordinateSelection::from_attribute(coordinates);
    let (x_name, y_name) = selection
        .geometry()
        .ok_or_else(|| format!("node coordinates '{}' have no single x and y", coordinates))?;

    let counts_meta = source
        .variable(count_variable)
        .ok_or_else(|| format!("node count variable '{}' not found", count_variable))?;
    let dimension = counts_meta
        .dimensions
        .first()
        .map(|d| d.name.clone())
        .ok_or("node count variable has no axis")?;

    let counts = source
        .read_doubles(count_variable, None)
        .map_err(|e| e.to_string())?;
    let xs = source.read_doubles(&x_name, None).map_err(|e| e.to_string())?;
    let ys = source.read_doubles(&y_name, None).map_err(|e| e.to_string())?;
    if xs.len() != ys.len() {
        return Err("x and y node coordinates differ in length".to_string());
    }

    let counts: Vec<usize> = match geometry_type.as_str() {
        "point" => vec![1; counts.len()],
        "line" => counts.iter().map(|&c| c.max(0.0) as usize).collect(),
        other => return Err(format!("unsupported geometry type '{}'", other)),
    };
    if counts.iter().sum::<usize>() > xs.len() {
        return Err("node counts exceed the number of nodes".to_string());
    }

    let mut offset = 0;
    let geometries = counts
        .iter()
        .filter_map(|&count| {
            let nodes = (offset..offset + count).map(|n| (xs[n], ys[n])).collect();
            offset += count;
            Geometry::from_nodes(nodes)
        })
        .collect::<Vec<_>>();

    if geometries.len() != counts.len() {
        return Err("a feature has no nodes".to_string());
    }
    Ok((dimension, geometries))
}

/// Points from 1-D x/y variables, line strings from 2-D ones.
fn read_legacy_geometries(x: &str, y: &str, source: &dyn ArraySource) -> Vec<Geometry> {
    let (xs, ys) = match (source.read_doubles(x, None), source.read_doubles(y, None)) {
        (Ok(xs), Ok(ys)) if xs.len() == ys.len() => (xs, ys),
        _ => {
            warn!(x, y, "could not read feature geometry");
            return Vec::new();
        }
    };

    let nodes_per_feature = match source.variable(x).map(|v| v.shape()) {
        Some(shape) if shape.len() == 2 => shape[1],
        _ => 1,
    };
    if nodes_per_feature == 0 {
        return Vec::new();
    }

    xs.chunks(nodes_per_feature)
        .zip(ys.chunks(nodes_per_feature))
        .map(|(xs, ys)| {
            let nodes = xs
                .iter()
                .zip(ys)
                .filter(|(x, y)| **x < GEOMETRY_FILL_THRESHOLD && **y < GEOMETRY_FILL_THRESHOLD)
                .map(|(x, y)| (*x, *y))
                .collect::<Vec<_>>();
            Geometry::from_nodes(nodes).unwrap_or(Geometry::LineString(Vec::new()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::MemorySource;
    use crate::feature::{FeatureKind, StructureFormula};

    fn with_geometry_container() -> MemorySource {
        let mut source = MemorySource::new("his.nc");
        source
            .add_dimension("cross_section", 2)
            .add_dimension("cross_section_geom_nNodes", 5)
            .add_dimension("name_len", 16);
        source
            .add_variable("cross_section_name", DataKind::Char, &["cross_section", "name_len"])
            .unwrap()
            .put_attribute("cf_role", "timeseries_id")
            .put_text(["cs_north", "cs_south"]);
        source
            .add_variable("cross_section_geom", DataKind::Integer, &[])
            .unwrap()
            .put_attribute("geometry_type", "line")
            .put_attribute("node_count", "cross_section_geom_node_count")
            .put_attribute(
                "node_coordinates",
                "cross_section_geom_node_coordx cross_section_geom_node_coordy",
            );
        source
            .add_variable("cross_section_geom_node_count", DataKind::Integer, &["cross_section"])
            .unwrap()
            .put_values(vec![2.0, 3.0])
            .unwrap();
        source
            .add_variable(
                "cross_section_geom_node_coordx",
                DataKind::Double,
                &["cross_section_geom_nNodes"],
            )
            .unwrap()
            .put_values(vec![0.0, 1.0, 10.0, 11.0, 12.0])
            .unwrap();
        source
            .add_variable(
                "cross_section_geom_node_coordy",
                DataKind::Double,
                &["cross_section_geom_nNodes"],
            )
            .unwrap()
            .put_values(vec![5.0, 6.0, 15.0, 16.0, 17.0])
            .unwrap();
        source
    }

    #[test]
    fn test_geometry_container_offsets_are_cumulative() {
        let source = with_geometry_container();
        let mut cache = FeatureCache::default();
        cache.load(&source);

        assert!(cache.has_names("cross_section"));
        let binding = cache.get_or_create_features("cross_section", None, &source);
        assert_eq!(binding.names(), vec!["cs_north", "cs_south"]);
        assert_eq!(binding.name_variable.as_deref(), Some("cross_section_name"));
        assert_eq!(
            binding.features[1].geometry,
            Some(Geometry::LineString(vec![(10.0, 15.0), (11.0, 16.0), (12.0, 17.0)]))
        );
        assert_eq!(binding.features[0].kind, FeatureKind::ObservationCrossSection);
    }

    #[test]
    fn test_memoized_binding_keeps_identity() {
        let source = with_geometry_container();
        let mut cache = FeatureCache::default();
        cache.load(&source);

        let first = cache.get_or_create_features("cross_section", None, &source);
        let second = cache.get_or_create_features("cross_section", None, &source);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first.features[0], &second.features[0]));

        cache.invalidate();
        assert!(cache.binding("cross_section").is_none());
        assert!(!cache.has_names("cross_section"));
    }

    #[test]
    fn test_supplied_features_are_reused() {
        let source = with_geometry_container();
        let supplied = Arc::new(Feature::new("CS_NORTH", FeatureKind::ObservationCrossSection));
        let wrong_kind = Arc::new(Feature::new("cs_south", FeatureKind::Pump));
        let mut cache = FeatureCache::new(vec![Arc::clone(&supplied), wrong_kind]);
        cache.load(&source);

        let binding = cache.get_or_create_features("cross_section", None, &source);
        assert!(Arc::ptr_eq(&binding.features[0], &supplied));
        assert_eq!(binding.features[1].kind, FeatureKind::ObservationCrossSection);
    }

    #[test]
    fn test_legacy_weir_names_get_formula_and_no_geometry() {
        let mut source = MemorySource::new("his.nc");
        source.add_dimension("weirgens", 2).add_dimension("name_len", 8);
        source
            .add_variable("weirgen_id", DataKind::Char, &["weirgens", "name_len"])
            .unwrap()
            .put_text(["weir1", "weir2"]);

        let mut cache = FeatureCache::default();
        cache.load(&source);
        let binding = cache.get_or_create_features("weirgens", None, &source);

        assert_eq!(binding.names(), vec!["weir1", "weir2"]);
        assert_eq!(binding.name_variable.as_deref(), Some("weirgen_id"));
        assert_eq!(binding.features[0].formula, Some(StructureFormula::SimpleWeir));
        assert!(binding.features[0].geometry.is_none());
    }

    #[test]
    fn test_legacy_line_geometry_skips_fill_values() {
        let mut source = MemorySource::new("his.nc");
        source
            .add_dimension("cross_section", 2)
            .add_dimension("cross_section_pts", 3)
            .add_dimension("name_len", 8);
        source
            .add_variable("cross_section_name", DataKind::Char, &["cross_section", "name_len"])
            .unwrap()
            .put_text(["a", "b"]);
        let fill = 9.969_209_968_386_869e36;
        source
            .add_variable(
                "cross_section_x_coordinate",
                DataKind::Double,
                &["cross_section", "cross_section_pts"],
            )
            .unwrap()
            .put_values(vec![0.0, 1.0, fill, 5.0, 6.0, 7.0])
            .unwrap();
        source
            .add_variable(
                "cross_section_y_coordinate",
                DataKind::Double,
                &["cross_section", "cross_section_pts"],
            )
            .unwrap()
            .put_values(vec![0.0, 1.0, fill, 5.0, 6.0, 7.0])
            .unwrap();

        let mut cache = FeatureCache::default();
        let binding = cache.get_or_create_features("cross_section", None, &source);
        assert_eq!(
            binding.features[0].geometry,
            Some(Geometry::LineString(vec![(0.0, 0.0), (1.0, 1.0)]))
        );
        assert_eq!(binding.features[1].geometry.as_ref().map(Geometry::node_count), Some(3));
        assert_eq!(
            binding.geometry_variables,
            Some((
                "cross_section_x_coordinate".to_string(),
                "cross_section_y_coordinate".to_string()
            ))
        );
    }

    #[test]
    fn test_unresolvable_and_unknown_axes_are_empty() {
        let mut source = MemorySource::new("his.nc");
        source.add_dimension("pumps", 3).add_dimension("laterals", 2).add_dimension("name_len", 8);
        source
            .add_variable("lateral_id", DataKind::Char, &["laterals", "name_len"])
            .unwrap()
            .put_attribute("cf_role", "timeseries_id")
            .put_text(["lat1", "lat2"]);

        let mut cache = FeatureCache::default();
        cache.load(&source);

        let pumps = cache.get_or_create_features("pumps", None, &source);
        assert!(pumps.is_empty());
        assert_eq!(pumps.dimension, "pumps");

        let laterals = cache.get_or_create_features("laterals", None, &source);
        assert!(laterals.is_empty());
        assert_eq!(laterals.name_variable.as_deref(), Some("lateral_id"));
    }

    #[test]
    fn test_unmapped_coordinates_fall_back_to_legacy_names() {
        let mut source = MemorySource::new("his.nc");
        source.add_dimension("stations", 2).add_dimension("name_len", 8);
        source
            .add_variable("station_label", DataKind::Char, &["stations", "name_len"])
            .unwrap()
            .put_attribute("cf_role", "timeseries_id")
            .put_text(["label1", "label2"]);
        source
            .add_variable("station_id", DataKind::Char, &["stations", "name_len"])
            .unwrap()
            .put_text(["id1", "id2"]);

        let mut cache = FeatureCache::default();
        cache.load(&source);
        assert!(!cache.is_mapped("stations", Some("station_x station_y")));
        assert!(cache.is_mapped("stations", Some("STATION_LABEL")));

        let binding =
            cache.get_or_create_features("stations", Some("station_x_coordinate station_y_coordinate"), &source);
        assert_eq!(binding.names(), vec!["id1", "id2"]);
        assert_eq!(binding.name_variable.as_deref(), Some("station_id"));
    }
}
