//! Velocity composite
//!
//! Combines the eastward and northward velocity coverages into one coverage
//! with two components. The composite reuses the axes of the eastward coverage.

use crate::config::StoreConfig;
use crate::function::{Function, FunctionKind, COMPOSITE};
use crate::slice::{PRIMARY_AXIS, SECONDARY_AXIS};

/// Standard name pairs, preferred first.
pub const VELOCITY_PAIRS: [(&str, &str); 2] = [
    ("eastward_sea_water_velocity", "northward_sea_water_velocity"),
    ("sea_water_x_velocity", "sea_water_y_velocity"),
];

/// Build the composite, or `None` when either half is missing.
pub fn build_velocity_composite(functions: &[Function], config: &StoreConfig) -> Option<Function> {
    VELOCITY_PAIRS.iter().find_map(|(east, north)| {
        let east = find_candidate(functions, east)?;
        let north = find_candidate(functions, north)?;
        if !same_axes(east, north) {
            return None;
        }

        let mut attributes = east.attributes.clone();
        attributes.remove("standard_name");
        attributes.remove("long_name");
        attributes.insert(COMPOSITE.to_string(), "true".to_string());

        Some(Function {
            name: config.velocity_coverage_name.clone(),
            kind: east.kind,
            arguments: east.arguments.clone(),
            components: vec![east.components[0].clone(), north.components[0].clone()],
            attributes,
        })
    })
}

fn find_candidate<'a>(functions: &'a [Function], standard_name: &str) -> Option<&'a Function> {
    functions.iter().find(|f| {
        f.attribute("standard_name") == Some(standard_name)
            && f.arguments.len() == 2
            && f.components.len() == 1
            && !f.is_composite()
            && f.attribute(PRIMARY_AXIS).is_none()
            && f.attribute(SECONDARY_AXIS).is_none()
            && matches!(f.kind, FunctionKind::GridCoverage(_) | FunctionKind::FeatureCoverage)
    })
}

fn same_axes(a: &Function, b: &Function) -> bool {
    a.kind == b.kind
        && a.arguments
            .iter()
            .zip(&b.arguments)
            .all(|(x, y)| x.dimension == y.dimension && x.len == y.len)
}
