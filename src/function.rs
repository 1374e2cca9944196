//! Functions exposed by the store
//!
//! A [`Function`] is metadata only: its argument axes, its value components
//! and the attributes needed to address its values in the file. Values are
//! read on request through [`crate::store::FunctionStore`].

use crate::catalog::{ArrayVariable, DataKind};
use crate::slice::ArgumentAxis;
use std::collections::BTreeMap;
use std::fmt;

/// Attribute marking the two-component velocity coverage.
pub const COMPOSITE: &str = "Composite";
/// Reference date of the time argument, RFC 3339.
pub const REFERENCE_DATE: &str = "ReferenceDate";

/// Grid entity a coverage is defined on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridLocation {
    Face,
    Edge,
    Node,
    /// Classic map files: flow links between cells.
    FlowLink,
}

impl GridLocation {
    /// Map a UGRID `location` attribute value.
    pub fn from_ugrid(location: &str) -> Option<Self> {
        match location.to_lowercase().as_str() {
            "face" => Some(GridLocation::Face),
            "edge" => Some(GridLocation::Edge),
            "node" => Some(GridLocation::Node),
            _ => None,
        }
    }
}

impl fmt::Display for GridLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GridLocation::Face => "face",
            GridLocation::Edge => "edge",
            GridLocation::Node => "node",
            GridLocation::FlowLink => "flow link",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    TimeSeries,
    GridCoverage(GridLocation),
    FeatureCoverage,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::TimeSeries => f.write_str("time series"),
            FunctionKind::GridCoverage(location) => write!(f, "grid coverage ({})", location),
            FunctionKind::FeatureCoverage => f.write_str("feature coverage"),
        }
    }
}

/// One argument axis of a function
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub axis: ArgumentAxis,
    /// Dimension of the file this argument runs along.
    pub dimension: String,
    pub len: usize,
    /// Variable backing the argument values. Location axes have none: their
    /// values are indices or features.
    pub variable: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

/// One value component of a function
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    /// Variable holding the values.
    pub variable: String,
    pub unit: Option<String>,
    pub kind: DataKind,
    pub no_data_value: f64,
}

impl Component {
    pub fn from_variable(variable: &ArrayVariable, no_data_value: f64) -> Self {
        Self {
            name: variable.name.clone(),
            variable: variable.name.clone(),
            unit: variable.units().map(str::to_string),
            kind: variable.kind,
            no_data_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub kind: FunctionKind,
    pub arguments: Vec<Argument>,
    pub components: Vec<Component>,
    pub attributes: BTreeMap<String, String>,
}

impl Function {
    pub fn argument(&self, axis: ArgumentAxis) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.axis == axis)
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn is_composite(&self) -> bool {
        self.attribute(COMPOSITE) == Some("true")
    }

    /// Axis name of a feature coverage's feature argument.
    pub fn feature_dimension(&self) -> Option<&str> {
        match self.kind {
            FunctionKind::FeatureCoverage => self
                .argument(ArgumentAxis::Location)
                .map(|a| a.dimension.as_str()),
            _ => None,
        }
    }

    /// Variable of the first component; functions are grouped by it.
    pub fn primary_variable(&self) -> Option<&str> {
        self.components.first().map(|c| c.variable.as_str())
    }
}

/// Display name of the functions built from `variable`: the long name (or
/// standard name) followed by the variable name, or the bare variable name.
pub fn display_name(variable: &ArrayVariable) -> String {
    match variable.long_name().or_else(|| variable.standard_name()) {
        Some(label) => format!("{} ({})", label, variable.name),
        None => variable.name.clone(),
    }
}
