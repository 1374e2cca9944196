//! Store configuration
//!
//! Axis names and constants that differ between model kernel versions are kept
//! here rather than hard-coded in the builders, so that a caller reading files
//! from an older kernel can adjust them.

use crate::parallel::ParallelConfig;

pub const DEFAULT_TIME_AXIS: &str = "time";
pub const SEDIMENT_SUSPENDED_AXIS: &str = "nSedSus";
pub const SEDIMENT_TOTAL_AXIS: &str = "nSedTot";
pub const BED_LAYER_AXIS: &str = "nBedLayers";
pub const DEFAULT_MISSING_VALUE: f64 = -999.0;
pub const VELOCITY_COVERAGE_NAME: &str = "velocity (ucx + ucy)";

/// Configuration for a [`crate::store::FunctionStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Accepted names of the time axis. The first entry is canonical.
    pub time_axis_names: Vec<String>,
    /// The two mutually exclusive sediment-class axis names.
    pub sediment_axis_names: [String; 2],
    pub bed_layer_axis_name: String,
    /// No-data value assigned to every value component.
    pub missing_value: f64,
    /// Variables written by older kernels that are skipped without a warning.
    pub deprecated_variables: Vec<String>,
    pub velocity_coverage_name: String,
    pub parallel: ParallelConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            time_axis_names: vec![DEFAULT_TIME_AXIS.to_string()],
            sediment_axis_names: [
                SEDIMENT_SUSPENDED_AXIS.to_string(),
                SEDIMENT_TOTAL_AXIS.to_string(),
            ],
            bed_layer_axis_name: BED_LAYER_AXIS.to_string(),
            missing_value: DEFAULT_MISSING_VALUE,
            deprecated_variables: vec!["s0".to_string(), "u0".to_string()],
            velocity_coverage_name: VELOCITY_COVERAGE_NAME.to_string(),
            parallel: ParallelConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the accepted time axis names; `name` becomes canonical.
    pub fn with_time_axis(mut self, name: &str) -> Self {
        self.time_axis_names = vec![name.to_string()];
        self
    }

    pub fn with_missing_value(mut self, value: f64) -> Self {
        self.missing_value = value;
        self
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_deprecated_variables(mut self, names: &[&str]) -> Self {
        self.deprecated_variables = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// The canonical time axis name.
    pub fn time_axis_name(&self) -> &str {
        self.time_axis_names
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_TIME_AXIS)
    }

    pub fn is_time_axis(&self, name: &str) -> bool {
        self.time_axis_names.iter().any(|t| t == name)
    }

    pub fn is_sediment_axis(&self, name: &str) -> bool {
        self.sediment_axis_names.iter().any(|s| s == name)
    }

    pub fn is_bed_layer_axis(&self, name: &str) -> bool {
        self.bed_layer_axis_name == name
    }

    pub fn is_deprecated(&self, variable: &str) -> bool {
        self.deprecated_variables.iter().any(|d| d == variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_axis_names() {
        let config = StoreConfig::default();
        assert_eq!(config.time_axis_name(), "time");
        assert!(config.is_sediment_axis("nSedSus"));
        assert!(config.is_sediment_axis("nSedTot"));
        assert!(!config.is_sediment_axis("nBedLayers"));
        assert!(config.is_bed_layer_axis("nBedLayers"));
        assert!(config.is_deprecated("s0"));
        assert!(!config.is_deprecated("s1"));
        assert_eq!(config.missing_value, -999.0);
    }

    #[test]
    fn test_builder_methods() {
        let config = StoreConfig::new()
            .with_time_axis("Time")
            .with_missing_value(-1.0)
            .with_deprecated_variables(&[])
            .with_parallel(ParallelConfig::with_threads(2));

        assert_eq!(config.time_axis_name(), "Time");
        assert!(!config.is_time_axis("time"));
        assert_eq!(config.missing_value, -1.0);
        assert!(!config.is_deprecated("s0"));
        assert_eq!(config.parallel.num_threads, Some(2));
    }
}
