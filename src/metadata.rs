//! Human-readable and JSON views of a function store
//!
//! Used by the `hydrostore` binary to inspect map and history files.

use crate::data_source::ArraySource;
use crate::errors::Result;
use crate::function::{Argument, Function};
use crate::slice::ValueFilter;
use crate::store::FunctionStore;
use serde_json::{json, Value};

fn axes(function: &Function) -> String {
    function
        .arguments
        .iter()
        .map(|a| format!("{}[{}]", a.name, a.len))
        .collect::<Vec<_>>()
        .join(", ")
}

fn units(function: &Function) -> String {
    function
        .components
        .iter()
        .map(|c| c.unit.as_deref().unwrap_or("-"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prints the catalogue: one line per function.
pub fn print_functions<S: ArraySource>(store: &FunctionStore<S>) {
    println!("\n Functions in {}", store.path().display());
    println!("==============");

    if store.functions().is_empty() {
        println!("   (No functions found)");
        return;
    }

    for function in store.functions() {
        println!(
            "    {} ({}): ({}) [{}]",
            function.name,
            function.kind,
            axes(function),
            units(function)
        );
    }
    println!("\n {} functions", store.functions().len());
}

/// Prints arguments, components, attributes and the value range of one
/// function.
pub fn describe_function<S: ArraySource>(store: &FunctionStore<S>, name: &str) -> Result<()> {
    let function = store.function_by_name(name)?;

    println!("\n Function: {}", function.name);
    println!("================================");
    println!("   Kind: {}", function.kind);

    println!("\n   Arguments:");
    for argument in &function.arguments {
        print_argument(argument);
    }

    println!("\n   Components:");
    for (index, component) in function.components.iter().enumerate() {
        println!(
            "     - {} ({}, {}) no data = {}",
            component.name,
            component.kind.as_str(),
            component.unit.as_deref().unwrap_or("no unit"),
            component.no_data_value
        );
        println!("       length: {}", store.component_len(function, index)?);
        match store.value_range(function, index)? {
            Some(range) => println!(
                "       range: {} .. {} ({} valid values)",
                range.min, range.max, range.count
            ),
            None => println!("       range: no valid values"),
        }
    }

    if store.scaling_factor(function) > 1 {
        println!("\n   Scaling factor: {}", store.scaling_factor(function));
    }

    let features = store.feature_values(function);
    if let Some(dimension) = function.feature_dimension() {
        println!("\n   Features on '{}': {}", dimension, features.len());
        for feature in features.iter().take(10) {
            println!("     - {} ({:?})", feature.name, feature.kind);
        }
        if features.len() > 10 {
            println!("     ... {} more", features.len() - 10);
        }
    }

    if !function.attributes.is_empty() {
        println!("\n   Attributes:");
        for (key, value) in &function.attributes {
            println!("     {}: {}", key, value);
        }
    }

    Ok(())
}

fn print_argument(argument: &Argument) {
    let backing = argument.variable.as_deref().unwrap_or("indices");
    println!(
        "     - {} along '{}' ({} values from {})",
        argument.name, argument.dimension, argument.len, backing
    );
    for (key, value) in &argument.attributes {
        println!("         {}: {}", key, value);
    }
}

/// Prints the functions grouped by source variable.
pub fn print_groups<S: ArraySource>(store: &FunctionStore<S>) {
    println!("\n Groups");
    println!("==========");
    for (variable, functions) in store.function_groups() {
        println!("    {} ({})", variable, functions.len());
        for function in functions {
            println!("      - {}", function.name);
        }
    }
}

/// Prints the values of the first component of a function.
pub fn print_values<S: ArraySource>(
    store: &FunctionStore<S>,
    name: &str,
    filters: &[ValueFilter],
) -> Result<()> {
    let function = store.function_by_name(name)?;
    let values = store.component_values(function, 0, filters)?;
    println!("\n Values of {} {:?}", function.name, values.shape());
    println!("{}", values);
    Ok(())
}

/// The catalogue as JSON.
pub fn catalog_json<S: ArraySource>(store: &FunctionStore<S>) -> Value {
    let functions: Vec<Value> = store
        .functions()
        .iter()
        .map(|function| {
            json!({
                "name": function.name,
                "kind": function.kind.to_string(),
                "arguments": function.arguments.iter().map(|a| json!({
                    "name": a.name,
                    "dimension": a.dimension,
                    "length": a.len,
                    "variable": a.variable,
                })).collect::<Vec<_>>(),
                "components": function.components.iter().map(|c| json!({
                    "name": c.name,
                    "variable": c.variable,
                    "unit": c.unit,
                    "kind": c.kind.as_str(),
                    "no_data_value": c.no_data_value,
                })).collect::<Vec<_>>(),
                "attributes": function.attributes,
                "features": store.feature_values(function).iter().map(|f| f.name.clone()).collect::<Vec<_>>(),
            })
        })
        .collect();

    json!({
        "path": store.path().display().to_string(),
        "dialect": format!("{:?}", store.catalog().dialect()),
        "time_axis": store.catalog().time_axis(),
        "functions": functions,
    })
}
