//! Coverage and function builder
//!
//! Every time-dependent variable of the catalogue passes through [`BuildPlan`]:
//!
//! - one axis: a time series;
//! - two axes: a grid coverage when the second axis is a grid location, a
//!   feature coverage when it is a feature axis;
//! - three or four axes (UGRID only): one grid coverage per index of the
//!   sediment and/or bed-layer axes, produced lazily by [`FanOut`].
//!
//! Anything else is skipped with a warning naming the variable. Building never
//! fails as a whole.

use crate::cache::FeatureCache;
use crate::catalog::{ArrayVariable, Dialect, Dimension, VariableCatalog};
use crate::config::StoreConfig;
use crate::data_source::ArraySource;
use crate::feature::FeatureCategory;
use crate::function::{
    display_name, Argument, Component, Function, FunctionKind, GridLocation, REFERENCE_DATE,
};
use crate::slice::{ArgumentAxis, ExtraAxes, PRIMARY_AXIS, SECONDARY_AXIS};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const NFLOWELEM: &str = "nFlowElem";
const NFLOWLINK: &str = "nFlowLink";
const NNETLINK: &str = "nNetLink";
const NFLOWELEMBND: &str = "nFlowElemBnd";

/// What a variable becomes
#[derive(Debug, Clone, PartialEq)]
pub enum BuildPlan {
    Skip,
    TimeSeries,
    GridCoverage(GridLocation),
    FeatureCoverage { dimension: String },
    FanOut { location: GridLocation, extra: ExtraAxes },
}

/// Result of building one variable
#[derive(Debug, Clone)]
pub enum Built {
    Single(Function),
    FanOut(FanOut),
}

impl Built {
    pub fn into_functions(self) -> Box<dyn Iterator<Item = Function>> {
        match self {
            Built::Single(function) => Box::new(std::iter::once(function)),
            Built::FanOut(fan_out) => Box::new(fan_out),
        }
    }
}

enum Location {
    Grid(GridLocation),
    Unsupported(String),
    NotGrid,
}

pub struct CoverageBuilder<'a> {
    config: &'a StoreConfig,
    catalog: &'a VariableCatalog,
    cache: &'a mut FeatureCache,
    source: &'a dyn ArraySource,
}

impl<'a> CoverageBuilder<'a> {
    pub fn new(
        config: &'a StoreConfig,
        catalog: &'a VariableCatalog,
        cache: &'a mut FeatureCache,
        source: &'a dyn ArraySource,
    ) -> Self {
        Self {
            config,
            catalog,
            cache,
            source,
        }
    }

    /// Build every time-dependent variable of the catalogue, in file order.
    ///
    /// Fan-outs are expanded here: functions hold no values, and lookups by
    /// name need every fanned-out name.
    pub fn build_all(&mut self) -> Vec<Function> {
        let catalog = self.catalog;
        let mut functions = Vec::new();
        for variable in catalog.time_dependent() {
            if let Some(built) = self.build(variable) {
                functions.extend(built.into_functions());
            }
        }
        functions
    }

    pub fn build(&mut self, variable: &ArrayVariable) -> Option<Built> {
        let built = match self.plan(variable) {
            BuildPlan::Skip => return None,
            BuildPlan::TimeSeries => Built::Single(self.function(
                variable,
                FunctionKind::TimeSeries,
                vec![self.time_argument(variable)],
            )),
            BuildPlan::GridCoverage(location) => {
                Built::Single(self.grid_coverage(variable, location, &ExtraAxes::None))
            }
            BuildPlan::FeatureCoverage { dimension } => {
                self.cache
                    .get_or_create_features(&dimension, variable.coordinates(), self.source);
                let arguments = vec![
                    self.time_argument(variable),
                    location_argument(&variable.dimensions[1]),
                ];
                Built::Single(self.function(variable, FunctionKind::FeatureCoverage, arguments))
            }
            BuildPlan::FanOut { location, extra } => {
                Built::FanOut(FanOut::new(self.grid_coverage(variable, location, &extra), extra))
            }
        };
        Some(built)
    }

    /// Decide what `variable` becomes. Skips are logged here.
    pub fn plan(&self, variable: &ArrayVariable) -> BuildPlan {
        if self.config.is_deprecated(&variable.name) {
            debug!(variable = %variable.name, "skipping deprecated variable");
            return BuildPlan::Skip;
        }
        if !variable.kind.is_numeric() {
            warn!(
                variable = %variable.name,
                kind = variable.kind.as_str(),
                "unsupported value type, variable is skipped"
            );
            return BuildPlan::Skip;
        }

        match variable.rank() {
            1 => BuildPlan::TimeSeries,
            2 => self.plan_two_axes(variable),
            3 | 4 => self.plan_fan_out(variable),
            rank => {
                warn!(variable = %variable.name, rank, "unsupported number of axes, variable is skipped");
                BuildPlan::Skip
            }
        }
    }

    fn plan_two_axes(&self, variable: &ArrayVariable) -> BuildPlan {
        let dimension = &variable.dimensions[1].name;
        match self.location_of(variable) {
            Location::Grid(location) => BuildPlan::GridCoverage(location),
            Location::Unsupported(location) => {
                warn!(variable = %variable.name, location = %location, "unsupported location, variable is skipped");
                BuildPlan::Skip
            }
            Location::NotGrid => {
                let feature_axis = FeatureCategory::from_dimension_name(dimension).is_some()
                    || self.cache.has_names(dimension)
                    || variable.coordinates().is_some();
                if feature_axis {
                    BuildPlan::FeatureCoverage {
                        dimension: dimension.clone(),
                    }
                } else {
                    warn!(
                        variable = %variable.name,
                        dimension = %dimension,
                        "second axis is neither a grid location nor a feature axis, variable is skipped"
                    );
                    BuildPlan::Skip
                }
            }
        }
    }

    fn plan_fan_out(&self, variable: &ArrayVariable) -> BuildPlan {
        if self.catalog.dialect() == Dialect::Classic {
            warn!(
                variable = %variable.name,
                "variables with more than two axes are only supported in UGRID files, variable is filtered out"
            );
            return BuildPlan::Skip;
        }

        let extra = match ExtraAxes::classify(variable, self.config) {
            Ok(extra) => extra,
            Err(e) => {
                warn!(variable = %variable.name, error = %e, "variable is skipped");
                return BuildPlan::Skip;
            }
        };

        match self.location_of(variable) {
            Location::Grid(location) => BuildPlan::FanOut { location, extra },
            _ => {
                warn!(
                    variable = %variable.name,
                    "multi-axis variable without a face, edge or node location is skipped"
                );
                BuildPlan::Skip
            }
        }
    }

    fn location_of(&self, variable: &ArrayVariable) -> Location {
        match self.catalog.dialect() {
            Dialect::Ugrid => match variable.location() {
                Some(location) => match GridLocation::from_ugrid(location) {
                    Some(grid) => Location::Grid(grid),
                    None if location.eq_ignore_ascii_case("volume") => {
                        Location::Unsupported(location.to_string())
                    }
                    None => Location::NotGrid,
                },
                None => Location::NotGrid,
            },
            Dialect::Classic => match variable.dimensions.get(1).map(|d| d.name.as_str()) {
                Some(NFLOWELEM) => Location::Grid(GridLocation::Face),
                Some(NFLOWLINK) => Location::Grid(GridLocation::FlowLink),
                Some(other @ (NNETLINK | NFLOWELEMBND)) => Location::Unsupported(other.to_string()),
                _ => Location::NotGrid,
            },
        }
    }

    fn grid_coverage(&self, variable: &ArrayVariable, location: GridLocation, extra: &ExtraAxes) -> Function {
        let positions = extra.argument_positions(variable.rank());
        let mut arguments = vec![self.time_argument(variable)];
        if let Some(&position) = positions.get(1) {
            arguments.push(location_argument(&variable.dimensions[position]));
        }
        self.function(variable, FunctionKind::GridCoverage(location), arguments)
    }

    fn function(&self, variable: &ArrayVariable, kind: FunctionKind, arguments: Vec<Argument>) -> Function {
        Function {
            name: display_name(variable),
            kind,
            arguments,
            components: vec![Component::from_variable(variable, self.config.missing_value)],
            attributes: variable.attributes.clone(),
        }
    }

    fn time_argument(&self, variable: &ArrayVariable) -> Argument {
        let axis = &variable.dimensions[0];
        let time_variable = self.catalog.time_variable();

        let mut attributes = BTreeMap::new();
        if let Some(units) = time_variable.and_then(|v| v.units()) {
            attributes.insert("units".to_string(), units.to_string());
        }
        if let Some(reference) = self.catalog.time_reference() {
            attributes.insert(REFERENCE_DATE.to_string(), reference.epoch.to_rfc3339());
        }

        Argument {
            name: "Time".to_string(),
            axis: ArgumentAxis::Time,
            dimension: axis.name.clone(),
            len: axis.len,
            variable: time_variable.map(|v| v.name.clone()),
            attributes,
        }
    }
}

fn location_argument(dimension: &Dimension) -> Argument {
    Argument {
        name: dimension.name.clone(),
        axis: ArgumentAxis::Location,
        dimension: dimension.name.clone(),
        len: dimension.len,
        variable: None,
        attributes: BTreeMap::new(),
    }
}

/// Lazy producer of the per-index coverages of a 3- or 4-axis variable
///
/// Functions are created on demand from a template. For two extra axes the
/// bed layer is the outer loop. Cloning a `FanOut` restarts nothing; use
/// [`FanOut::restart`] to iterate again.
#[derive(Debug, Clone)]
pub struct FanOut {
    template: Function,
    extra: ExtraAxes,
    next: usize,
}

impl FanOut {
    pub fn new(template: Function, extra: ExtraAxes) -> Self {
        Self {
            template,
            extra,
            next: 0,
        }
    }

    pub fn extra_axes(&self) -> &ExtraAxes {
        &self.extra
    }

    /// Total number of functions, regardless of iteration progress.
    pub fn total(&self) -> usize {
        self.extra.index_count()
    }

    pub fn restart(&mut self) {
        self.next = 0;
    }

    /// The function for flat index `index`, without advancing.
    pub fn function_at(&self, index: usize) -> Option<Function> {
        if index >= self.total() {
            return None;
        }

        let mut function = self.template.clone();
        match self.extra {
            ExtraAxes::None => {}
            ExtraAxes::Sediment(_) | ExtraAxes::BedLayer(_) => {
                function.name = format!("{} ({})", self.template.name, index);
                function
                    .attributes
                    .insert(PRIMARY_AXIS.to_string(), index.to_string());
            }
            ExtraAxes::BedLayerAndSediment { sediment, .. } => {
                let (bed_layer, fraction) = (index / sediment.len, index % sediment.len);
                function.name = format!("{} ({}) ({})", self.template.name, bed_layer, fraction);
                function
                    .attributes
                    .insert(PRIMARY_AXIS.to_string(), bed_layer.to_string());
                function
                    .attributes
                    .insert(SECONDARY_AXIS.to_string(), fraction.to_string());
            }
        }
        Some(function)
    }
}

impl Iterator for FanOut {
    type Item = Function;

    fn next(&mut self) -> Option<Function> {
        let function = self.function_at(self.next)?;
        self.next += 1;
        Some(function)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FanOut {}
