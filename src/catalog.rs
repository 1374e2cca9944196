//! Variable and dimension catalogue
//!
//! Reads the variable list of an [`ArraySource`] once and classifies every
//! variable as static, time-dependent scalar or time-dependent spatial. The
//! catalogue also detects which naming dialect the file follows and parses the
//! reference date of the time axis.

use crate::config::StoreConfig;
use crate::data_source::ArraySource;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const STANDARD_NAME: &str = "standard_name";
pub const LONG_NAME: &str = "long_name";
pub const UNITS: &str = "units";
pub const COORDINATES: &str = "coordinates";
pub const LOCATION: &str = "location";
pub const CF_ROLE: &str = "cf_role";
pub const CONVENTIONS: &str = "Conventions";

/// Canonical storage kind of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Double,
    Float,
    Integer,
    Byte,
    Char,
    Text,
}

impl DataKind {
    /// Floating point or a supported integer width.
    pub fn is_numeric(self) -> bool {
        matches!(self, DataKind::Double | DataKind::Float | DataKind::Integer)
    }

    pub fn is_textual(self) -> bool {
        matches!(self, DataKind::Char | DataKind::Text)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::Double => "double",
            DataKind::Float => "float",
            DataKind::Integer => "int",
            DataKind::Byte => "byte",
            DataKind::Char => "char",
            DataKind::Text => "string",
        }
    }
}

/// A named axis with a fixed length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
}

impl Dimension {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
        }
    }
}

/// Immutable description of one variable in the array file
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayVariable {
    pub name: String,
    pub kind: DataKind,
    pub dimensions: Vec<Dimension>,
    pub attributes: BTreeMap<String, String>,
}

impl ArrayVariable {
    pub fn new(name: impl Into<String>, kind: DataKind, dimensions: Vec<Dimension>) -> Self {
        Self {
            name: name.into(),
            kind,
            dimensions,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.dimensions.iter().map(|d| d.len).collect()
    }

    /// Number of elements of the whole variable.
    pub fn element_count(&self) -> usize {
        self.dimensions.iter().map(|d| d.len).product()
    }

    pub fn position_of(&self, dimension: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name == dimension)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn standard_name(&self) -> Option<&str> {
        self.attribute(STANDARD_NAME)
    }

    pub fn long_name(&self) -> Option<&str> {
        self.attribute(LONG_NAME)
    }

    pub fn units(&self) -> Option<&str> {
        self.attribute(UNITS)
    }

    pub fn coordinates(&self) -> Option<&str> {
        self.attribute(COORDINATES).filter(|c| !c.trim().is_empty())
    }

    pub fn location(&self) -> Option<&str> {
        self.attribute(LOCATION)
    }

    pub fn cf_role(&self) -> Option<&str> {
        self.attribute(CF_ROLE)
    }
}

/// How a variable takes part in function construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Static,
    TimeScalar,
    TimeSpatial,
}

/// Naming convention the file follows for grid locations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// The second axis name doubles as the location (`nFlowElem`, `nFlowLink`).
    Classic,
    /// Explicit `location` attributes and mesh topology variables.
    Ugrid,
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub variable: ArrayVariable,
    pub classification: Classification,
}

/// Classified variables of one file, in file order
#[derive(Debug, Clone)]
pub struct VariableCatalog {
    entries: Vec<CatalogEntry>,
    dialect: Dialect,
    time_axis: String,
    time_reference: Option<TimeReference>,
}

impl VariableCatalog {
    /// Classify every variable of `source`. Variables that cannot be
    /// classified are logged and left out; this never fails.
    pub fn build(source: &dyn ArraySource, config: &StoreConfig) -> Self {
        let variables = source.variables();
        let dialect = detect_dialect(source, &variables);

        let entries = variables
            .into_iter()
            .filter_map(|variable| {
                classify(&variable, config).map(|classification| CatalogEntry {
                    variable,
                    classification,
                })
            })
            .collect::<Vec<_>>();

        let time_axis = config.time_axis_name().to_string();
        let time_reference = entries
            .iter()
            .find(|e| e.variable.name == time_axis)
            .and_then(|e| e.variable.units())
            .and_then(|units| {
                let parsed = TimeReference::parse(units);
                if parsed.is_none() {
                    warn!(units, "could not parse reference date of the time axis");
                }
                parsed
            });

        debug!(
            variables = entries.len(),
            ?dialect,
            path = %source.path().display(),
            "built variable catalogue"
        );

        Self {
            entries,
            dialect,
            time_axis,
            time_reference,
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&ArrayVariable> {
        self.entries
            .iter()
            .find(|e| e.variable.name == name)
            .map(|e| &e.variable)
    }

    pub fn classification(&self, name: &str) -> Option<Classification> {
        self.entries
            .iter()
            .find(|e| e.variable.name == name)
            .map(|e| e.classification)
    }

    /// Time-dependent variables, scalar and spatial, in file order.
    pub fn time_dependent(&self) -> impl Iterator<Item = &ArrayVariable> {
        self.entries
            .iter()
            .filter(|e| e.classification != Classification::Static)
            .map(|e| &e.variable)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn time_axis(&self) -> &str {
        &self.time_axis
    }

    /// The time coordinate variable, if the file carries one.
    pub fn time_variable(&self) -> Option<&ArrayVariable> {
        self.get(&self.time_axis)
    }

    pub fn time_reference(&self) -> Option<&TimeReference> {
        self.time_reference.as_ref()
    }
}

/// Classify one variable. `None` means the variable is excluded.
pub fn classify(variable: &ArrayVariable, config: &StoreConfig) -> Option<Classification> {
    let first_axis = match variable.dimensions.first() {
        Some(d) => d,
        None => return Some(Classification::Static),
    };

    // The coordinate variable of the time axis is not a function of time.
    if !config.is_time_axis(&first_axis.name) || variable.name == first_axis.name {
        return Some(Classification::Static);
    }

    if variable.rank() == 1 {
        return Some(Classification::TimeScalar);
    }

    if variable.kind.is_numeric() {
        Some(Classification::TimeSpatial)
    } else {
        warn!(
            variable = %variable.name,
            kind = variable.kind.as_str(),
            "unexpected data type for a time-dependent spatial variable, variable is excluded"
        );
        None
    }
}

fn detect_dialect(source: &dyn ArraySource, variables: &[ArrayVariable]) -> Dialect {
    let declared = source
        .global_attribute(CONVENTIONS)
        .map(|c| c.to_uppercase().contains("UGRID"))
        .unwrap_or(false);
    let has_topology = variables
        .iter()
        .any(|v| v.cf_role() == Some("mesh_topology"));

    if declared || has_topology {
        Dialect::Ugrid
    } else {
        Dialect::Classic
    }
}

/// Parsed `"<unit> since <date>"` of a CF time axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeReference {
    pub seconds_per_unit: f64,
    pub epoch: DateTime<Utc>,
}

impl TimeReference {
    pub fn parse(units: &str) -> Option<Self> {
        let lower = units.to_lowercase();
        let split = lower.find(" since ")?;
        let unit = lower[..split].trim();
        let date = units.get(split + " since ".len()..)?.trim();

        let seconds_per_unit = match unit {
            "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
            "min" | "mins" | "minute" | "minutes" => 60.0,
            "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
            "d" | "day" | "days" => 86_400.0,
            _ => return None,
        };

        Some(Self {
            seconds_per_unit,
            epoch: parse_reference_date(date)?,
        })
    }

    /// Seconds since the Unix epoch, used when the time axis has no units.
    pub fn unix_seconds() -> Self {
        Self {
            seconds_per_unit: 1.0,
            epoch: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn to_datetime(&self, offset: f64) -> Option<DateTime<Utc>> {
        let millis = (offset * self.seconds_per_unit * 1_000.0).round();
        if !millis.is_finite() {
            return None;
        }
        TimeDelta::try_milliseconds(millis as i64).and_then(|d| self.epoch.checked_add_signed(d))
    }
}

fn parse_reference_date(date: &str) -> Option<DateTime<Utc>> {
    for format in ["%Y-%m-%d %H:%M:%S %:z", "%Y-%m-%d %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(date, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(date, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
