//! Array source abstraction
//!
//! The function store reads everything through [`ArraySource`], so the same
//! construction logic runs over a NetCDF file ([`crate::netcdf_io::NetCdfSource`])
//! or over arrays assembled in memory ([`MemorySource`]).

use crate::catalog::{ArrayVariable, DataKind, Dimension};
use crate::errors::{Result, StoreError};
use crate::slice::SliceSpec;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Read access to a self-describing multidimensional array container
pub trait ArraySource {
    /// Location of the underlying file, used in diagnostics.
    fn path(&self) -> &Path;

    /// Global attribute rendered as text.
    fn global_attribute(&self, name: &str) -> Option<String>;

    /// All variables in file order.
    fn variables(&self) -> Vec<ArrayVariable>;

    fn variable(&self, name: &str) -> Option<ArrayVariable>;

    fn dimension_len(&self, name: &str) -> Option<usize>;

    /// Read numeric values widened to `f64`, in row-major order. `None` reads
    /// the whole variable.
    fn read_doubles(&self, name: &str, slice: Option<&SliceSpec>) -> Result<Vec<f64>>;

    /// Read a character variable `(n, strlen)` or a string variable `(n)` as
    /// one trimmed string per entry of its first axis.
    fn read_text(&self, name: &str) -> Result<Vec<String>>;

    /// Reopen the underlying file after it was rewritten externally.
    fn reopen(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Doubles(Vec<f64>),
    Text(Vec<String>),
    /// Declared but never written; reads fail.
    Missing,
}

/// One variable of a [`MemorySource`]
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryVariable {
    meta: ArrayVariable,
    payload: Payload,
}

impl MemoryVariable {
    pub fn put_attribute(&mut self, key: &str, value: &str) -> &mut Self {
        self.meta.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// Store row-major values; the length must match the declared shape.
    pub fn put_values(&mut self, values: Vec<f64>) -> Result<&mut Self> {
        let expected = self.meta.element_count();
        if values.len() != expected {
            return Err(StoreError::InvalidSlice {
                message: format!(
                    "variable '{}' expects {} values, got {}",
                    self.meta.name,
                    expected,
                    values.len()
                ),
            });
        }
        self.payload = Payload::Doubles(values);
        Ok(self)
    }

    pub fn put_text<S: Into<String>>(&mut self, values: impl IntoIterator<Item = S>) -> &mut Self {
        self.payload = Payload::Text(values.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Contents {
    global_attributes: BTreeMap<String, String>,
    dimensions: Vec<Dimension>,
    variables: Vec<MemoryVariable>,
}

/// In-memory [`ArraySource`]
///
/// Built the way a NetCDF file is written: dimensions first, then variables
/// with their attributes and values.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    path: PathBuf,
    contents: Contents,
    rewritten: Option<Contents>,
    reopen_count: usize,
}

impl MemorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn add_global_attribute(&mut self, key: &str, value: &str) -> &mut Self {
        self.contents
            .global_attributes
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn add_dimension(&mut self, name: &str, len: usize) -> &mut Self {
        match self.contents.dimensions.iter_mut().find(|d| d.name == name) {
            Some(existing) => existing.len = len,
            None => self.contents.dimensions.push(Dimension::new(name, len)),
        }
        self
    }

    /// Declare a variable over previously added dimensions.
    pub fn add_variable(
        &mut self,
        name: &str,
        kind: DataKind,
        dimensions: &[&str],
    ) -> Result<&mut MemoryVariable> {
        let dims = dimensions
            .iter()
            .map(|dim| {
                self.contents
                    .dimensions
                    .iter()
                    .find(|d| d.name == *dim)
                    .cloned()
                    .ok_or_else(|| StoreError::DimensionNotFound {
                        var: name.to_string(),
                        dim: dim.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        self.contents.variables.retain(|v| v.meta.name != name);
        self.contents.variables.push(MemoryVariable {
            meta: ArrayVariable::new(name, kind, dims),
            payload: Payload::Missing,
        });
        let last = self.contents.variables.len() - 1;
        Ok(&mut self.contents.variables[last])
    }

    /// Replace the contents on the next [`ArraySource::reopen`], the way an
    /// external tool rewrites a file while it is open.
    pub fn stage_rewrite(&mut self, rewritten: MemorySource) {
        self.rewritten = Some(rewritten.contents);
    }

    pub fn reopen_count(&self) -> usize {
        self.reopen_count
    }

    fn find(&self, name: &str) -> Result<&MemoryVariable> {
        self.contents
            .variables
            .iter()
            .find(|v| v.meta.name == name)
            .ok_or_else(|| StoreError::VariableNotFound {
                var: name.to_string(),
            })
    }
}

impl ArraySource for MemorySource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn global_attribute(&self, name: &str) -> Option<String> {
        self.contents.global_attributes.get(name).cloned()
    }

    fn variables(&self) -> Vec<ArrayVariable> {
        self.contents
            .variables
            .iter()
            .map(|v| v.meta.clone())
            .collect()
    }

    fn variable(&self, name: &str) -> Option<ArrayVariable> {
        self.find(name).ok().map(|v| v.meta.clone())
    }

    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.contents
            .dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.len)
    }

    fn read_doubles(&self, name: &str, slice: Option<&SliceSpec>) -> Result<Vec<f64>> {
        let variable = self.find(name)?;
        let values = match &variable.payload {
            Payload::Doubles(values) => values,
            Payload::Text(_) => {
                return Err(StoreError::Generic(format!(
                    "variable '{}' holds text, not numbers",
                    name
                )))
            }
            Payload::Missing => {
                return Err(StoreError::Generic(format!(
                    "no data written for variable '{}'",
                    name
                )))
            }
        };

        match slice {
            None => Ok(values.clone()),
            Some(spec) => {
                let dims = variable.meta.shape();
                spec.validate(&dims)?;
                Ok(gather(values, &dims, spec))
            }
        }
    }

    fn read_text(&self, name: &str) -> Result<Vec<String>> {
        match &self.find(name)?.payload {
            Payload::Text(values) => Ok(values
                .iter()
                .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
                .collect()),
            _ => Err(StoreError::Generic(format!(
                "variable '{}' holds no text",
                name
            ))),
        }
    }

    fn reopen(&mut self) -> Result<()> {
        if let Some(contents) = self.rewritten.take() {
            self.contents = contents;
        }
        self.reopen_count += 1;
        Ok(())
    }
}

/// Collect the elements addressed by `spec` from a row-major array.
fn gather(values: &[f64], dims: &[usize], spec: &SliceSpec) -> Vec<f64> {
    let count = spec.element_count();
    if dims.is_empty() {
        return values.to_vec();
    }

    let mut row_strides = vec![1usize; dims.len()];
    for axis in (0..dims.len() - 1).rev() {
        row_strides[axis] = row_strides[axis + 1] * dims[axis + 1];
    }

    let mut out = Vec::with_capacity(count);
    let mut index = vec![0usize; dims.len()];
    for _ in 0..count {
        let flat: usize = index
            .iter()
            .enumerate()
            .map(|(axis, &k)| (spec.origin[axis] + k * spec.stride[axis]) * row_strides[axis])
            .sum();
        out.push(values[flat]);

        for axis in (0..dims.len()).rev() {
            index[axis] += 1;
            if index[axis] < spec.shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    out
}
