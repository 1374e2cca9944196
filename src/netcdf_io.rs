//! NetCDF file access
//!
//! [`NetCdfSource`] implements [`ArraySource`] over the `netcdf` crate. Numeric
//! values of any width are read as `f64`; the library converts on the fly.

use crate::catalog::{ArrayVariable, DataKind, Dimension};
use crate::data_source::ArraySource;
use crate::errors::{Result, StoreError};
use crate::slice::SliceSpec;
use netcdf::extent::Extent;
use netcdf::{AttributeValue, File, Variable};
use std::path::{Path, PathBuf};
use tracing::debug;

/// An open NetCDF map or history file
pub struct NetCdfSource {
    path: PathBuf,
    file: File,
}

impl NetCdfSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path)?;
        debug!(path = %path.display(), "opened NetCDF file");
        Ok(Self { path, file })
    }

    fn find(&self, name: &str) -> Result<Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| StoreError::VariableNotFound {
                var: name.to_string(),
            })
    }
}

impl std::fmt::Debug for NetCdfSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetCdfSource")
            .field("path", &self.path)
            .finish()
    }
}

impl ArraySource for NetCdfSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn global_attribute(&self, name: &str) -> Option<String> {
        let attr = self.file.attributes().find(|a| a.name() == name)?;
        attribute_text(attr.value().ok()?)
    }

    fn variables(&self) -> Vec<ArrayVariable> {
        self.file.variables().map(|v| describe(&v)).collect()
    }

    fn variable(&self, name: &str) -> Option<ArrayVariable> {
        self.file.variable(name).map(|v| describe(&v))
    }

    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.file.dimension(name).map(|d| d.len())
    }

    fn read_doubles(&self, name: &str, slice: Option<&SliceSpec>) -> Result<Vec<f64>> {
        let var = self.find(name)?;
        let values = match slice {
            None => var.get_values::<f64, _>(..)?,
            Some(spec) => {
                let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
                spec.validate(&dims)?;
                var.get_values::<f64, _>(extents(spec))?
            }
        };
        Ok(values)
    }

    fn read_text(&self, name: &str) -> Result<Vec<String>> {
        let var = self.find(name)?;
        let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        match (data_kind(&var), dims.as_slice()) {
            (DataKind::Char, [rows, width]) => {
                let raw = var.get_raw_values(..)?;
                Ok((0..*rows)
                    .map(|row| {
                        let bytes = raw.get(row * width..(row + 1) * width).unwrap_or(&[]);
                        String::from_utf8_lossy(bytes)
                            .trim_end_matches(['\0', ' '])
                            .to_string()
                    })
                    .collect())
            }
            (DataKind::Text, [rows]) => (0..*rows)
                .map(|row| {
                    var.get_string([row])
                        .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
                        .map_err(StoreError::from)
                })
                .collect(),
            (kind, _) => Err(StoreError::Generic(format!(
                "variable '{}' of type {} with {} axes holds no names",
                name,
                kind.as_str(),
                dims.len()
            ))),
        }
    }

    fn reopen(&mut self) -> Result<()> {
        self.file = netcdf::open(&self.path)?;
        debug!(path = %self.path.display(), "reopened NetCDF file");
        Ok(())
    }
}

fn extents(spec: &SliceSpec) -> Vec<Extent> {
    spec.shape
        .iter()
        .zip(&spec.origin)
        .zip(&spec.stride)
        .map(|((&count, &start), &stride)| Extent::SliceCount {
            start,
            count,
            stride: stride as isize,
        })
        .collect()
}

fn describe(var: &Variable) -> ArrayVariable {
    let dimensions = var
        .dimensions()
        .iter()
        .map(|d| Dimension::new(d.name().to_string(), d.len()))
        .collect();

    let mut variable = ArrayVariable::new(var.name().to_string(), data_kind(var), dimensions);
    for attr in var.attributes() {
        if let Some(text) = attr.value().ok().and_then(attribute_text) {
            variable.attributes.insert(attr.name().to_string(), text);
        }
    }
    variable
}

/// Map the NetCDF variable type onto [`DataKind`].
fn data_kind(var: &Variable) -> DataKind {
    // Get data type as string - simplified approach
    let data_type = format!("{:?}", var.vartype()).to_lowercase();

    if data_type.contains("f64") || data_type.contains("double") {
        DataKind::Double
    } else if data_type.contains("f32") || data_type.contains("float") {
        DataKind::Float
    } else if data_type.contains("char") {
        DataKind::Char
    } else if data_type.contains("string") {
        DataKind::Text
    } else if data_type.contains("i8") || data_type.contains("u8") || data_type.contains("byte") {
        DataKind::Byte
    } else {
        DataKind::Integer
    }
}

fn attribute_text(value: AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Str(s) => Some(s),
        AttributeValue::Strs(values) => Some(values.join(" ")),
        AttributeValue::Double(v) => Some(v.to_string()),
        AttributeValue::Float(v) => Some(v.to_string()),
        AttributeValue::Int(v) => Some(v.to_string()),
        AttributeValue::Short(v) => Some(v.to_string()),
        _ => None,
    }
}
