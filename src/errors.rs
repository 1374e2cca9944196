//! Centralized error handling for hydrostore
//!
//! Only opening a file, reconnecting and explicit lookups surface these errors.
//! Everything that happens while the function catalogue is built degrades to a
//! logged skip instead (see [`crate::builder`]).

use std::fmt;
use std::path::PathBuf;

/// Main error type for hydrostore operations
#[derive(Debug)]
pub enum StoreError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// The file could not be reopened after a rewrite; the store is empty
    Reconnect {
        path: PathBuf,
        source: Box<StoreError>,
    },

    /// Variable not found in the array file
    VariableNotFound { var: String },

    /// Dimension not found in variable
    DimensionNotFound { var: String, dim: String },

    /// No function with this name exists in the store
    FunctionNotFound { name: String },

    /// Malformed or unsupported dimensionality of a single variable
    Parsing { var: String, message: String },

    /// Invalid slice specification
    InvalidSlice { message: String },

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Generic error
    Generic(String),
}

impl StoreError {
    /// Shorthand for a [`StoreError::Parsing`] scoped to one variable.
    pub fn parsing(var: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Parsing {
            var: var.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            StoreError::Reconnect { path, source } => {
                write!(f, "Could not reconnect to '{}': {}", path.display(), source)
            }
            StoreError::VariableNotFound { var } => write!(f, "Variable '{}' not found in file", var),
            StoreError::DimensionNotFound { var, dim } => {
                write!(f, "Dimension '{}' not found in variable '{}'", dim, var)
            }
            StoreError::FunctionNotFound { name } => write!(f, "Function '{}' not found in store", name),
            StoreError::Parsing { var, message } => {
                write!(f, "Could not parse variable '{}': {}", var, message)
            }
            StoreError::InvalidSlice { message } => write!(f, "Invalid slice specification: {}", message),
            StoreError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            StoreError::ArrayError(e) => write!(f, "Array error: {}", e),
            StoreError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::NetCDFError(e) => Some(e),
            StoreError::Reconnect { source, .. } => Some(source.as_ref()),
            StoreError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for StoreError {
    fn from(error: netcdf::Error) -> Self {
        StoreError::NetCDFError(error)
    }
}

impl From<ndarray::ShapeError> for StoreError {
    fn from(error: ndarray::ShapeError) -> Self {
        StoreError::ArrayError(error)
    }
}

/// Result type alias for hydrostore operations
pub type Result<T> = std::result::Result<T, StoreError>;
