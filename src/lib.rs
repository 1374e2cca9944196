//! hydrostore: lazily evaluated functions over hydrodynamic NetCDF output
//!
//! A hydrodynamic kernel writes its results as NetCDF map files (values on
//! the faces, edges and nodes of an unstructured grid, in either the classic
//! or the UGRID dialect) and history files (values at stations, cross
//! sections and structures). hydrostore turns the variables of such a file
//! into typed functions:
//!
//! - **time series** for variables along time only;
//! - **grid coverages** for variables along time and a grid location;
//! - **feature coverages** for variables along time and a feature axis, bound
//!   to named features with geometries.
//!
//! Variables with an extra sediment or bed-layer axis fan out into one grid
//! coverage per index. Values are never read while the catalogue is built;
//! they are read on every request through a (shape, origin, stride) slice.
//!
//! ## Module Organization
//!
//! - [`catalog`]: classification of the variables of a file
//! - [`compat`]: legacy naming and geometry variables of feature axes
//! - [`cache`]: per-axis feature bindings
//! - [`slice`]: slice resolution for multi-axis variables
//! - [`builder`]: function construction and fan-out
//! - [`velocity`]: the two-component velocity coverage
//! - [`store`]: the [`FunctionStore`] tying everything together
//! - [`data_source`], [`netcdf_io`]: the array source boundary
//! - [`statistics`], [`parallel`]: parallel value ranges
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//! ```rust,no_run
//! use hydrostore::prelude::*;
//!
//! let store = FunctionStore::open("FlowFM_his.nc", StoreConfig::default())?;
//! let discharge = store.function_by_name("cross_section_discharge")?;
//! for feature in store.feature_values(discharge) {
//!     println!("{}", feature.name);
//! }
//! # Ok::<(), hydrostore::StoreError>(())
//! ```

pub mod builder;
pub mod cache;
pub mod catalog;
pub mod compat;
pub mod config;
pub mod data_source;
pub mod errors;
pub mod feature;
pub mod function;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod slice;
pub mod statistics;
pub mod store;
pub mod velocity;

pub use cache::FeatureBinding;
pub use catalog::{ArrayVariable, DataKind, Dialect, Dimension, VariableCatalog};
pub use config::StoreConfig;
pub use data_source::{ArraySource, MemorySource};
pub use errors::{Result, StoreError};
pub use feature::{Feature, FeatureCategory, FeatureKind, Geometry, StructureFormula};
pub use function::{Argument, Component, Function, FunctionKind, GridLocation};
pub use netcdf_io::NetCdfSource;
pub use parallel::ParallelConfig;
pub use slice::{ArgumentAxis, SliceSpec, ValueFilter};
pub use store::FunctionStore;

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::data_source::{ArraySource, MemorySource};
    pub use crate::errors::{Result, StoreError};
    pub use crate::feature::{Feature, FeatureKind};
    pub use crate::function::{Function, FunctionKind, GridLocation};
    pub use crate::slice::{ArgumentAxis, ValueFilter};
    pub use crate::store::FunctionStore;
    pub use crate::config::StoreConfig;
}
