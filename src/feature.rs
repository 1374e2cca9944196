//! Domain features bound to feature axes of history files
//!
//! A feature axis (`stations`, `pumps`, ...) has one entry per observation
//! point or structure. Each known axis belongs to a [`FeatureCategory`], which
//! decides the kind of feature synthesized for it and the legacy variable
//! names consulted when the file lacks modern coordinate references.

use std::fmt;

/// Closed set of feature categories found in history files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureCategory {
    Station,
    CrossSection,
    GeneralStructure,
    Weirgen,
    Gategen,
    Pump,
}

impl FeatureCategory {
    pub const ALL: [FeatureCategory; 6] = [
        FeatureCategory::Station,
        FeatureCategory::CrossSection,
        FeatureCategory::GeneralStructure,
        FeatureCategory::Weirgen,
        FeatureCategory::Gategen,
        FeatureCategory::Pump,
    ];

    /// Singular axis name of the category.
    pub fn key(self) -> &'static str {
        match self {
            FeatureCategory::Station => "station",
            FeatureCategory::CrossSection => "cross_section",
            FeatureCategory::GeneralStructure => "general_structure",
            FeatureCategory::Weirgen => "weirgen",
            FeatureCategory::Gategen => "gategen",
            FeatureCategory::Pump => "pump",
        }
    }

    /// Look up the category of an axis name. Schema revisions differ on
    /// pluralization, so both `station` and `stations` resolve.
    pub fn from_dimension_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| {
            let key = category.key();
            name == key || name.strip_suffix('s') == Some(key)
        })
    }

    /// Legacy naming variables, in order of preference.
    pub fn legacy_name_variables(self) -> &'static [&'static str] {
        match self {
            FeatureCategory::Station => &["station_id", "station_name"],
            FeatureCategory::CrossSection => &["cross_section_name"],
            FeatureCategory::GeneralStructure => &["general_structure_name", "general_structure_id"],
            FeatureCategory::Weirgen => &["weirgen_name", "weirgen_id"],
            FeatureCategory::Gategen => &["gategen_name"],
            FeatureCategory::Pump => &["pump_name", "pump_id"],
        }
    }

    /// Legacy x/y geometry variables, where the category has them.
    pub fn legacy_geometry_variables(self) -> Option<(&'static str, &'static str)> {
        match self {
            FeatureCategory::Station => Some(("station_x_coordinate", "station_y_coordinate")),
            FeatureCategory::CrossSection => {
                Some(("cross_section_x_coordinate", "cross_section_y_coordinate"))
            }
            FeatureCategory::Pump => Some(("pump_xmid", "pump_ymid")),
            _ => None,
        }
    }

    pub fn feature_kind(self) -> FeatureKind {
        match self {
            FeatureCategory::Station => FeatureKind::ObservationPoint,
            FeatureCategory::CrossSection => FeatureKind::ObservationCrossSection,
            FeatureCategory::GeneralStructure | FeatureCategory::Weirgen | FeatureCategory::Gategen => {
                FeatureKind::Structure
            }
            FeatureCategory::Pump => FeatureKind::Pump,
        }
    }

    /// Formula attached to structures synthesized for this category.
    pub fn formula(self) -> Option<StructureFormula> {
        match self {
            FeatureCategory::GeneralStructure => Some(StructureFormula::General),
            FeatureCategory::Weirgen => Some(StructureFormula::SimpleWeir),
            FeatureCategory::Gategen => Some(StructureFormula::SimpleGate),
            _ => None,
        }
    }
}

/// Capability of a feature, used to match caller-supplied features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    ObservationPoint,
    ObservationCrossSection,
    Structure,
    Pump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormula {
    General,
    SimpleWeir,
    SimpleGate,
}

impl fmt::Display for StructureFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StructureFormula::General => "general structure",
            StructureFormula::SimpleWeir => "simple weir",
            StructureFormula::SimpleGate => "simple gate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point { x: f64, y: f64 },
    LineString(Vec<(f64, f64)>),
}

impl Geometry {
    /// A single node collapses into a point.
    pub fn from_nodes(nodes: Vec<(f64, f64)>) -> Option<Self> {
        match nodes.as_slice() {
            [] => None,
            [(x, y)] => Some(Geometry::Point { x: *x, y: *y }),
            _ => Some(Geometry::LineString(nodes)),
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            Geometry::Point { .. } => 1,
            Geometry::LineString(nodes) => nodes.len(),
        }
    }
}

/// A named domain object on a feature axis
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub name: String,
    pub kind: FeatureKind,
    pub geometry: Option<Geometry>,
    pub formula: Option<StructureFormula>,
}

impl Feature {
    pub fn new(name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            kind,
            geometry: None,
            formula: None,
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_formula(mut self, formula: StructureFormula) -> Self {
        self.formula = Some(formula);
        self
    }

    /// Case-insensitive name match restricted to one capability.
    pub fn matches(&self, name: &str, kind: FeatureKind) -> bool {
        self.kind == kind && self.name.eq_ignore_ascii_case(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singular_and_plural_axis_names() {
        for category in FeatureCategory::ALL {
            let singular = category.key();
            let plural = format!("{}s", singular);
            assert_eq!(FeatureCategory::from_dimension_name(singular), Some(category));
            assert_eq!(FeatureCategory::from_dimension_name(&plural), Some(category));
        }
        assert_eq!(FeatureCategory::from_dimension_name("nFlowElem"), None);
        assert_eq!(FeatureCategory::from_dimension_name("pumpss"), None);
    }

    #[test]
    fn test_structure_categories() {
        assert_eq!(FeatureCategory::Weirgen.formula(), Some(StructureFormula::SimpleWeir));
        assert_eq!(FeatureCategory::Gategen.feature_kind(), FeatureKind::Structure);
        assert_eq!(FeatureCategory::Pump.formula(), None);
        assert_eq!(
            FeatureCategory::Pump.legacy_name_variables(),
            &["pump_name", "pump_id"]
        );
        assert!(FeatureCategory::Weirgen.legacy_geometry_variables().is_none());
    }

    #[test]
    fn test_feature_matching() {
        let pump = Feature::new("Pump01", FeatureKind::Pump);
        assert!(pump.matches("pump01", FeatureKind::Pump));
        assert!(!pump.matches("pump01", FeatureKind::Structure));
        assert!(!pump.matches("pump02", FeatureKind::Pump));
    }

    #[test]
    fn test_geometry_from_nodes() {
        assert_eq!(Geometry::from_nodes(vec![]), None);
        assert_eq!(
            Geometry::from_nodes(vec![(1.0, 2.0)]),
            Some(Geometry::Point { x: 1.0, y: 2.0 })
        );
        let line = Geometry::from_nodes(vec![(0.0, 0.0), (1.0, 1.0)]).unwrap();
        assert_eq!(line.node_count(), 2);
    }
}
