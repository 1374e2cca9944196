//! Multidimensional slice resolution
//!
//! A function built from a 3- or 4-axis variable addresses a single index of
//! its sediment and/or bed-layer axis. The index is stored as an attribute on
//! the function ([`PRIMARY_AXIS`], [`SECONDARY_AXIS`]) and turned into a
//! `(shape, origin, stride)` triple here whenever its values are read.
//!
//! When a read carries no filters, the slice starts out covering every axis of
//! the variable and the extra axes are overwritten in place. Filtered reads
//! start from the argument axes only (time, location) and the extra axes are
//! inserted at their positions. The bed-layer index is resolved before the
//! sediment index; the inserts are applied in dimension order.

use crate::catalog::ArrayVariable;
use crate::config::StoreConfig;
use crate::errors::{Result, StoreError};
use std::collections::BTreeMap;

/// Function attribute holding the index along the first extra axis.
pub const PRIMARY_AXIS: &str = "PrimaryAxis";
/// Function attribute holding the sediment index of a 4-axis variable.
pub const SECONDARY_AXIS: &str = "SecondaryAxis";

/// Portion of a variable's backing array to read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceSpec {
    pub shape: Vec<usize>,
    pub origin: Vec<usize>,
    pub stride: Vec<usize>,
}

impl SliceSpec {
    /// Slice covering the complete array.
    pub fn full(dims: &[usize]) -> Self {
        Self {
            shape: dims.to_vec(),
            origin: vec![0; dims.len()],
            stride: vec![1; dims.len()],
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check the slice against the dimension lengths of a variable.
    pub fn validate(&self, dims: &[usize]) -> Result<()> {
        if self.origin.len() != self.rank() || self.stride.len() != self.rank() {
            return Err(StoreError::InvalidSlice {
                message: "shape, origin and stride differ in length".to_string(),
            });
        }
        if self.rank() != dims.len() {
            return Err(StoreError::InvalidSlice {
                message: format!(
                    "slice has {} axes but the variable has {}",
                    self.rank(),
                    dims.len()
                ),
            });
        }
        for (axis, &len) in dims.iter().enumerate() {
            let (count, start, step) = (self.shape[axis], self.origin[axis], self.stride[axis]);
            if step == 0 {
                return Err(StoreError::InvalidSlice {
                    message: format!("zero stride on axis {}", axis),
                });
            }
            if count > 0 && start + (count - 1) * step >= len {
                return Err(StoreError::InvalidSlice {
                    message: format!(
                        "axis {}: {} elements from {} with stride {} exceed length {}",
                        axis, count, start, step, len
                    ),
                });
            }
        }
        Ok(())
    }

    fn place(&mut self, position: usize, origin: usize, insert: bool) {
        if insert {
            let at = position.min(self.rank());
            self.shape.insert(at, 1);
            self.origin.insert(at, origin);
            self.stride.insert(at, 1);
        } else {
            self.shape[position] = 1;
            self.origin[position] = origin;
            self.stride[position] = 1;
        }
    }
}

/// Argument axes a caller can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentAxis {
    Time,
    Location,
}

/// Restriction of one argument axis for a value read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFilter {
    /// A single index.
    Index { axis: ArgumentAxis, index: usize },
    /// The half-open range `start..end`.
    Range {
        axis: ArgumentAxis,
        start: usize,
        end: usize,
    },
}

impl ValueFilter {
    pub fn axis(&self) -> ArgumentAxis {
        match self {
            ValueFilter::Index { axis, .. } | ValueFilter::Range { axis, .. } => *axis,
        }
    }
}

/// Position and length of one extra axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSlot {
    pub position: usize,
    pub len: usize,
}

/// Extra physical axes of a variable beyond time and location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraAxes {
    None,
    Sediment(AxisSlot),
    BedLayer(AxisSlot),
    BedLayerAndSediment { bed_layer: AxisSlot, sediment: AxisSlot },
}

impl ExtraAxes {
    /// Classify the extra axes of `variable`. An axis that is neither a
    /// sediment nor a bed-layer axis is a parsing error for that variable.
    pub fn classify(variable: &ArrayVariable, config: &StoreConfig) -> Result<Self> {
        let sediment = axis_slots(variable, |name| config.is_sediment_axis(name));
        let bed_layer = axis_slots(variable, |name| config.is_bed_layer_axis(name));

        if sediment.len() > 1 {
            return Err(StoreError::parsing(
                &variable.name,
                "sediment axes are mutually exclusive",
            ));
        }

        match variable.rank() {
            0..=2 => Ok(ExtraAxes::None),
            3 => match (sediment.first(), bed_layer.first()) {
                (Some(s), _) => Ok(ExtraAxes::Sediment(*s)),
                (None, Some(b)) => Ok(ExtraAxes::BedLayer(*b)),
                (None, None) => Err(unsupported_axes(variable, config)),
            },
            4 => match (sediment.first(), bed_layer.first()) {
                (Some(s), Some(b)) => Ok(ExtraAxes::BedLayerAndSediment {
                    bed_layer: *b,
                    sediment: *s,
                }),
                _ => Err(unsupported_axes(variable, config)),
            },
            rank => Err(StoreError::parsing(
                &variable.name,
                format!("{} axes are not supported", rank),
            )),
        }
    }

    /// Divisor between the raw element count of the variable and the
    /// per-index length reported to callers.
    pub fn scaling_factor(&self) -> usize {
        match self {
            ExtraAxes::None => 1,
            ExtraAxes::Sediment(slot) | ExtraAxes::BedLayer(slot) => slot.len,
            ExtraAxes::BedLayerAndSediment { bed_layer, sediment } => bed_layer.len * sediment.len,
        }
    }

    /// Number of functions a variable with these axes fans out into.
    pub fn index_count(&self) -> usize {
        match self {
            ExtraAxes::None => 1,
            _ => self.scaling_factor(),
        }
    }

    pub fn positions(&self) -> Vec<usize> {
        match self {
            ExtraAxes::None => Vec::new(),
            ExtraAxes::Sediment(slot) | ExtraAxes::BedLayer(slot) => vec![slot.position],
            ExtraAxes::BedLayerAndSediment { bed_layer, sediment } => {
                vec![bed_layer.position, sediment.position]
            }
        }
    }

    /// Positions of the argument axes (time first) in a variable of `rank` axes.
    pub fn argument_positions(&self, rank: usize) -> Vec<usize> {
        let extra = self.positions();
        (0..rank).filter(|p| !extra.contains(p)).collect()
    }
}

fn axis_slots(variable: &ArrayVariable, matches: impl Fn(&str) -> bool) -> Vec<AxisSlot> {
    variable
        .dimensions
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, d)| matches(d.name.as_str()))
        .map(|(position, d)| AxisSlot { position, len: d.len })
        .collect()
}

fn unsupported_axes(variable: &ArrayVariable, config: &StoreConfig) -> StoreError {
    StoreError::parsing(
        &variable.name,
        format!(
            "scaling factor could not be determined, supported dimensions: {}, {}, {}",
            config.sediment_axis_names[0], config.sediment_axis_names[1], config.bed_layer_axis_name
        ),
    )
}

/// Compute the slice for reading `variable` on behalf of a function with the
/// given attributes.
pub fn resolve_slice(
    variable: &ArrayVariable,
    extra: &ExtraAxes,
    attributes: &BTreeMap<String, String>,
    filters: &[ValueFilter],
) -> Result<SliceSpec> {
    let dims = variable.shape();
    let insert = !filters.is_empty();

    let mut spec = if insert {
        let mut spec = SliceSpec::default();
        for (i, position) in extra.argument_positions(dims.len()).into_iter().enumerate() {
            let axis = if i == 0 {
                ArgumentAxis::Time
            } else {
                ArgumentAxis::Location
            };
            let (origin, count) = filter_bounds(filters, axis, dims[position])?;
            spec.shape.push(count);
            spec.origin.push(origin);
            spec.stride.push(1);
        }
        let has_location = dims.len() - extra.positions().len() >= 2;
        if !has_location && filters.iter().any(|f| f.axis() == ArgumentAxis::Location) {
            return Err(StoreError::InvalidSlice {
                message: format!("location filter on '{}', which has no location axis", variable.name),
            });
        }
        spec
    } else {
        SliceSpec::full(&dims)
    };

    match extra {
        ExtraAxes::None => {}
        ExtraAxes::Sediment(slot) | ExtraAxes::BedLayer(slot) => {
            let origin = axis_origin(variable, attributes, PRIMARY_AXIS, slot)?;
            spec.place(slot.position, origin, insert);
        }
        ExtraAxes::BedLayerAndSediment { bed_layer, sediment } => {
            let mut slots = [
                (bed_layer.position, axis_origin(variable, attributes, PRIMARY_AXIS, bed_layer)?),
                (sediment.position, axis_origin(variable, attributes, SECONDARY_AXIS, sediment)?),
            ];
            // Inserts only land on their dimension when applied front to back.
            slots.sort_by_key(|&(position, _)| position);
            for (position, origin) in slots {
                spec.place(position, origin, insert);
            }
        }
    }

    spec.validate(&dims)?;
    Ok(spec)
}

/// Shape of the values returned for `spec`, with the extra axes dropped.
pub fn value_shape(spec: &SliceSpec, extra: &ExtraAxes) -> Vec<usize> {
    let extra = extra.positions();
    spec.shape
        .iter()
        .enumerate()
        .filter(|(p, _)| !extra.contains(p))
        .map(|(_, &len)| len)
        .collect()
}

fn axis_origin(
    variable: &ArrayVariable,
    attributes: &BTreeMap<String, String>,
    key: &str,
    slot: &AxisSlot,
) -> Result<usize> {
    let value = attributes
        .get(key)
        .ok_or_else(|| StoreError::parsing(&variable.name, format!("missing {} index", key)))?;
    let origin: usize = value
        .trim()
        .parse()
        .map_err(|_| StoreError::parsing(&variable.name, "index is not of integer type"))?;
    if origin >= slot.len {
        return Err(StoreError::InvalidSlice {
            message: format!(
                "index {} is out of range for an axis of length {}",
                origin, slot.len
            ),
        });
    }
    Ok(origin)
}

fn filter_bounds(filters: &[ValueFilter], axis: ArgumentAxis, len: usize) -> Result<(usize, usize)> {
    match filters.iter().find(|f| f.axis() == axis) {
        None => Ok((0, len)),
        Some(ValueFilter::Index { index, .. }) if *index < len => Ok((*index, 1)),
        Some(ValueFilter::Range { start, end, .. }) if start < end && *end <= len => {
            Ok((*start, end - start))
        }
        Some(filter) => Err(StoreError::InvalidSlice {
            message: format!("{:?} is out of range for an axis of length {}", filter, len),
        }),
    }
}
