//! The function store
//!
//! [`FunctionStore`] owns one array source for the duration of a read session.
//! Opening it classifies the variables, binds feature axes and builds every
//! function once. Values are read lazily on every request and never cached.
//!
//! ```no_run
//! use hydrostore::prelude::*;
//!
//! let store = FunctionStore::open("FlowFM_map.nc", StoreConfig::default())?;
//! for function in store.functions() {
//!     println!("{} ({})", function.name, function.kind);
//! }
//! let water_level = store.function_by_name("mesh2d_s1")?;
//! let first_step = store.component_values(
//!     water_level,
//!     0,
//!     &[ValueFilter::Index { axis: ArgumentAxis::Time, index: 0 }],
//! )?;
//! # Ok::<(), hydrostore::StoreError>(())
//! ```

use crate::builder::CoverageBuilder;
use crate::cache::{FeatureBinding, FeatureCache};
use crate::catalog::{ArrayVariable, TimeReference, VariableCatalog};
use crate::config::StoreConfig;
use crate::data_source::ArraySource;
use crate::errors::{Result, StoreError};
use crate::feature::Feature;
use crate::function::{Component, Function};
use crate::netcdf_io::NetCdfSource;
use crate::slice::{resolve_slice, value_shape, ArgumentAxis, ExtraAxes, ValueFilter};
use crate::statistics::{self, ValueRange};
use crate::velocity;
use chrono::{DateTime, Utc};
use ndarray::{ArrayD, IxDyn};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct FunctionStore<S: ArraySource = NetCdfSource> {
    source: S,
    config: StoreConfig,
    catalog: VariableCatalog,
    cache: FeatureCache,
    functions: Vec<Function>,
}

impl FunctionStore<NetCdfSource> {
    /// Open a NetCDF map or history file and build its functions.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let source = NetCdfSource::open(path)?;
        Ok(Self::from_source(source, config))
    }
}

impl<S: ArraySource> FunctionStore<S> {
    pub fn from_source(source: S, config: StoreConfig) -> Self {
        Self::with_features(source, config, Vec::new())
    }

    /// Build a store that binds `supplied` features to feature axes wherever
    /// their names and kinds match. The features are shared, never copied.
    pub fn with_features(source: S, config: StoreConfig, supplied: Vec<Arc<Feature>>) -> Self {
        let catalog = VariableCatalog::build(&source, &config);
        let mut store = Self {
            source,
            config,
            catalog,
            cache: FeatureCache::new(supplied),
            functions: Vec::new(),
        };
        store.build_functions();
        store
    }

    fn build_functions(&mut self) {
        self.cache.load(&self.source);
        let mut functions =
            CoverageBuilder::new(&self.config, &self.catalog, &mut self.cache, &self.source)
                .build_all();
        if let Some(composite) = velocity::build_velocity_composite(&functions, &self.config) {
            functions.push(composite);
        }

        info!(
            path = %self.source.path().display(),
            functions = functions.len(),
            feature_axes = self.cache.bindings().count(),
            "built function catalogue"
        );
        self.functions = functions;
    }

    /// Reopen the underlying file after an external rewrite.
    ///
    /// Feature bindings and functions are dropped before the file is reopened,
    /// so a failed reopen leaves an empty store rather than a stale one.
    pub fn reconnect(&mut self) -> Result<()> {
        self.functions.clear();
        self.cache.invalidate();

        if let Err(e) = self.source.reopen() {
            error!(path = %self.source.path().display(), error = %e, "reconnecting failed");
            return Err(StoreError::Reconnect {
                path: self.source.path().to_path_buf(),
                source: Box::new(e),
            });
        }

        self.catalog = VariableCatalog::build(&self.source, &self.config);
        self.build_functions();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        self.source.path()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the source. Call [`FunctionStore::reconnect`] after
    /// changing what it serves.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn catalog(&self) -> &VariableCatalog {
        &self.catalog
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function_by_name(&self, name: &str) -> Result<&Function> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| StoreError::FunctionNotFound {
                name: name.to_string(),
            })
    }

    /// Functions grouped by the variable of their first component. Fan-out
    /// siblings share a group; the velocity composite is left out.
    pub fn function_groups(&self) -> BTreeMap<String, Vec<&Function>> {
        let mut groups: BTreeMap<String, Vec<&Function>> = BTreeMap::new();
        for function in self.functions.iter().filter(|f| !f.is_composite()) {
            if let Some(variable) = function.primary_variable() {
                groups.entry(variable.to_string()).or_default().push(function);
            }
        }
        groups
    }

    pub fn feature_binding(&self, dimension: &str) -> Option<Arc<FeatureBinding>> {
        self.cache.binding(dimension)
    }

    /// Features bound to `dimension`; empty when the axis could not be
    /// resolved.
    pub fn features_for_dimension(&self, dimension: &str) -> Vec<Arc<Feature>> {
        self.cache
            .binding(dimension)
            .map(|binding| binding.features.clone())
            .unwrap_or_default()
    }

    /// Features along the feature argument of `function`. Empty for functions
    /// without one and for unresolved axes.
    pub fn feature_values(&self, function: &Function) -> Vec<Arc<Feature>> {
        function
            .feature_dimension()
            .map(|dimension| self.features_for_dimension(dimension))
            .unwrap_or_default()
    }

    /// Indices along the location argument of `function`.
    pub fn location_indices(&self, function: &Function) -> Vec<usize> {
        function
            .argument(ArgumentAxis::Location)
            .map(|argument| (0..argument.len).collect())
            .unwrap_or_default()
    }

    /// Timestamps of the time argument of `function`.
    ///
    /// Offsets without usable units are taken as seconds since 1970-01-01. A
    /// failing read, or an offset outside the representable range, gives the
    /// reference date for that step, so the result always has one entry per
    /// time step.
    pub fn time_values(&self, function: &Function) -> Vec<DateTime<Utc>> {
        let argument = match function.argument(ArgumentAxis::Time) {
            Some(argument) => argument,
            None => return Vec::new(),
        };

        let offsets = match &argument.variable {
            Some(variable) => match self.source.read_doubles(variable, None) {
                Ok(offsets) => offsets,
                Err(e) => {
                    error!(
                        variable = %variable,
                        path = %self.source.path().display(),
                        error = %e,
                        "could not read time values"
                    );
                    vec![0.0; argument.len]
                }
            },
            None => (0..argument.len).map(|i| i as f64).collect(),
        };

        let reference = match self.catalog.time_reference() {
            Some(reference) => *reference,
            None => {
                warn!(
                    time_axis = self.catalog.time_axis(),
                    "time axis has no usable units, reading offsets as seconds since 1970-01-01"
                );
                TimeReference::unix_seconds()
            }
        };

        offsets
            .into_iter()
            .enumerate()
            .map(|(step, offset)| {
                reference.to_datetime(offset).unwrap_or_else(|| {
                    warn!(step, offset, "time offset out of range, using the reference date");
                    reference.epoch
                })
            })
            .collect()
    }

    /// Number of extra-axis indices folded into each function of `function`'s
    /// variable: the sediment or bed-layer length, their product, or 1.
    pub fn scaling_factor(&self, function: &Function) -> usize {
        function
            .primary_variable()
            .and_then(|name| self.catalog.get(name))
            .map(|variable| self.extra_axes(variable).scaling_factor())
            .unwrap_or(1)
    }

    /// Unfiltered number of values of one component.
    pub fn component_len(&self, function: &Function, component_index: usize) -> Result<usize> {
        let (_, variable) = self.component_variable(function, component_index)?;
        Ok(variable.element_count() / self.extra_axes(variable).scaling_factor())
    }

    /// Read the values of one component, restricted by `filters`.
    ///
    /// The result has one axis per argument of the function. If the read
    /// itself fails the error is logged and zeros of the expected shape are
    /// returned; invalid filters are reported as errors.
    pub fn component_values(
        &self,
        function: &Function,
        component_index: usize,
        filters: &[ValueFilter],
    ) -> Result<ArrayD<f64>> {
        let (_, variable) = self.component_variable(function, component_index)?;
        let extra = self.extra_axes(variable);
        let spec = resolve_slice(variable, &extra, &function.attributes, filters)?;
        let shape = value_shape(&spec, &extra);

        let values = match self.source.read_doubles(&variable.name, Some(&spec)) {
            Ok(values) => values,
            Err(e) => {
                error!(
                    variable = %variable.name,
                    path = %self.source.path().display(),
                    error = %e,
                    "reading values failed, returning zeros"
                );
                vec![0.0; spec.element_count()]
            }
        };

        Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
    }

    /// Range of the valid values of one component, skipping its no-data
    /// value. `None` when no valid value exists.
    pub fn value_range(
        &self,
        function: &Function,
        component_index: usize,
    ) -> Result<Option<ValueRange>> {
        let (component, _) = self.component_variable(function, component_index)?;
        let values = self.component_values(function, component_index, &[])?;
        Ok(statistics::array_range(&values, component.no_data_value))
    }

    fn component_variable<'a>(
        &'a self,
        function: &'a Function,
        component_index: usize,
    ) -> Result<(&'a Component, &'a ArrayVariable)> {
        let component = function.components.get(component_index).ok_or_else(|| {
            StoreError::Generic(format!(
                "function '{}' has no component {}",
                function.name, component_index
            ))
        })?;
        let variable =
            self.catalog
                .get(&component.variable)
                .ok_or_else(|| StoreError::VariableNotFound {
                    var: component.variable.clone(),
                })?;
        Ok((component, variable))
    }

    fn extra_axes(&self, variable: &ArrayVariable) -> ExtraAxes {
        ExtraAxes::classify(variable, &self.config).unwrap_or(ExtraAxes::None)
    }
}

impl<S: ArraySource + std::fmt::Debug> std::fmt::Debug for FunctionStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionStore")
            .field("source", &self.source)
            .field("functions", &self.functions.len())
            .finish()
    }
}
