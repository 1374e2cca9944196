//! Defines command-line interface options using `clap` for the hydrostore binary.

use clap::Parser;
use hydrostore::{ArgumentAxis, ValueFilter};
use std::path::PathBuf;

/// A CLI tool for inspecting the functions of hydrodynamic NetCDF output
#[derive(Parser, Debug)]
#[command(
    version,
    name = "hydrostore",
    about = "Inspect time series and coverages of NetCDF map and history files"
)]
pub struct Args {
    /// Path to the NetCDF map or history file
    #[arg(short, long)]
    pub file: PathBuf,

    /// List all functions in the file
    #[arg(long)]
    pub list: bool,

    /// Describe one function (arguments, components, value range)
    #[arg(long)]
    pub describe: Option<String>,

    /// Print the functions grouped by source variable
    #[arg(long)]
    pub groups: bool,

    /// Print the values of a function's first component
    #[arg(long)]
    pub values: Option<String>,

    /// Restrict --values along time, formatted as <index> or <start>:<end>
    #[arg(long, value_parser = parse_time_filter)]
    pub time: Option<ValueFilter>,

    /// Restrict --values along the location axis, formatted as <index> or <start>:<end>
    #[arg(long, value_parser = parse_location_filter)]
    pub location: Option<ValueFilter>,

    /// Print the catalogue as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
}

impl Args {
    pub fn filters(&self) -> Vec<ValueFilter> {
        self.time.into_iter().chain(self.location).collect()
    }
}

fn parse_time_filter(s: &str) -> Result<ValueFilter, String> {
    parse_filter(s, ArgumentAxis::Time)
}

fn parse_location_filter(s: &str) -> Result<ValueFilter, String> {
    parse_filter(s, ArgumentAxis::Location)
}

fn parse_filter(s: &str, axis: ArgumentAxis) -> Result<ValueFilter, String> {
    let index = |part: &str| {
        part.trim()
            .parse::<usize>()
            .map_err(|_| format!("Invalid index '{}'", part))
    };

    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [single] => Ok(ValueFilter::Index {
            axis,
            index: index(single)?,
        }),
        [start, end] => Ok(ValueFilter::Range {
            axis,
            start: index(start)?,
            end: index(end)?,
        }),
        _ => Err("Invalid format: Expected '<index>' or '<start>:<end>'.".to_string()),
    }
}
