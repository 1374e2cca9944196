//! Store behaviour over in-memory map and history files
//!
//! These tests build files with `MemorySource` the way the kernel writes them
//! and check the catalogue, feature bindings and lazy reads of the store.

use hydrostore::feature::Feature;
use hydrostore::function::COMPOSITE;
use hydrostore::slice::{PRIMARY_AXIS, SECONDARY_AXIS};
use hydrostore::{
    ArgumentAxis, DataKind, FeatureKind, FunctionKind, FunctionStore, GridLocation, MemorySource,
    Result, StoreConfig, ValueFilter,
};
use std::sync::Arc;

const TIME_STEPS: usize = 4;

fn map_file() -> MemorySource {
    let mut source = MemorySource::new("FlowFM_map.nc");
    source.add_global_attribute("Conventions", "CF-1.8 UGRID-1.0");
    source
        .add_dimension("time", TIME_STEPS)
        .add_dimension("mesh2d_nFaces", 5)
        .add_dimension("nSedSus", 3)
        .add_dimension("nBedLayers", 2);
    source
        .add_variable("time", DataKind::Double, &["time"])
        .expect("time")
        .put_attribute("units", "minutes since 2021-06-01 12:00:00")
        .put_values(vec![0.0, 10.0, 20.0, 30.0])
        .expect("time values");
    source
}

fn his_file(axis: &str) -> MemorySource {
    let mut source = MemorySource::new("FlowFM_his.nc");
    source
        .add_dimension("time", TIME_STEPS)
        .add_dimension(axis, 2)
        .add_dimension("name_len", 16);
    source
        .add_variable("time", DataKind::Double, &["time"])
        .expect("time")
        .put_attribute("units", "seconds since 2021-06-01")
        .put_values(vec![0.0, 60.0, 120.0, 180.0])
        .expect("time values");
    source
}

#[test]
fn test_time_series_length_equals_time_axis() -> Result<()> {
    let mut source = map_file();
    source
        .add_variable("timestep", DataKind::Double, &["time"])?
        .put_values(vec![1.0, 1.5, 2.0, 2.5])?;
    source
        .add_variable("nr_iterations", DataKind::Integer, &["time"])?
        .put_values(vec![3.0, 4.0, 4.0, 5.0])?;

    let store = FunctionStore::from_source(source, StoreConfig::default());
    let series: Vec<_> = store
        .functions()
        .iter()
        .filter(|f| f.kind == FunctionKind::TimeSeries)
        .collect();
    assert_eq!(series.len(), 2);

    for function in series {
        let values = store.component_values(function, 0, &[])?;
        assert_eq!(values.len(), TIME_STEPS);
        assert_eq!(store.component_len(function, 0)?, TIME_STEPS);
        assert_eq!(store.time_values(function).len(), TIME_STEPS);
    }
    Ok(())
}

#[test]
fn test_unrepresentable_time_offsets_keep_the_axis_length() -> Result<()> {
    let mut source = MemorySource::new("FlowFM_his.nc");
    source.add_dimension("time", TIME_STEPS);
    source
        .add_variable("time", DataKind::Double, &["time"])?
        .put_attribute("units", "seconds since 2021-06-01")
        .put_values(vec![0.0, f64::NAN, 1.0e300, 180.0])?;
    source
        .add_variable("timestep", DataKind::Double, &["time"])?
        .put_values(vec![60.0; TIME_STEPS])?;

    let store = FunctionStore::from_source(source, StoreConfig::default());
    let times = store.time_values(store.function_by_name("timestep")?);
    assert_eq!(times.len(), TIME_STEPS);
    assert_eq!(times[1], times[0]);
    assert_eq!(times[2], times[0]);
    assert_eq!(times[3].timestamp() - times[0].timestamp(), 180);
    Ok(())
}

#[test]
fn test_sediment_axis_fans_out_per_fraction() -> Result<()> {
    let mut source = map_file();
    source
        .add_variable("mesh2d_sscon", DataKind::Double, &["time", "mesh2d_nFaces", "nSedSus"])?
        .put_attribute("location", "face")
        .put_attribute("units", "kg m-3")
        .put_values((0..TIME_STEPS * 5 * 3).map(|i| i as f64).collect())?;

    let store = FunctionStore::from_source(source, StoreConfig::default());
    let groups = store.function_groups();
    let fanned = &groups["mesh2d_sscon"];
    assert_eq!(fanned.len(), 3);

    let names: Vec<&str> = fanned.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["mesh2d_sscon (0)", "mesh2d_sscon (1)", "mesh2d_sscon (2)"]);

    for (index, function) in fanned.iter().enumerate() {
        assert_eq!(function.kind, FunctionKind::GridCoverage(GridLocation::Face));
        assert_eq!(function.attribute(PRIMARY_AXIS), Some(index.to_string().as_str()));
        assert_eq!(store.scaling_factor(function), 3);
        assert_eq!(store.component_len(function, 0)?, TIME_STEPS * 5);

        // Row-major: element (t, f, s) sits at 15 t + 3 f + s.
        let values = store.component_values(function, 0, &[])?;
        assert_eq!(values.shape(), &[TIME_STEPS, 5]);
        let expected: Vec<f64> = (0..TIME_STEPS * 5).map(|i| (3 * i + index) as f64).collect();
        assert_eq!(values.iter().copied().collect::<Vec<_>>(), expected);
    }
    Ok(())
}

#[test]
fn test_bed_layer_and_sediment_fan_out() -> Result<()> {
    let mut source = map_file();
    source
        .add_variable(
            "mesh2d_msed",
            DataKind::Double,
            &["time", "mesh2d_nFaces", "nBedLayers", "nSedSus"],
        )?
        .put_attribute("location", "face")
        .put_values((0..TIME_STEPS * 5 * 2 * 3).map(|i| i as f64).collect())?;

    let store = FunctionStore::from_source(source, StoreConfig::default());
    let groups = store.function_groups();
    let fanned = &groups["mesh2d_msed"];
    assert_eq!(fanned.len(), 2 * 3);

    let last = fanned[5];
    assert_eq!(last.name, "mesh2d_msed (1) (2)");
    assert_eq!(last.attribute(PRIMARY_AXIS), Some("1"));
    assert_eq!(last.attribute(SECONDARY_AXIS), Some("2"));
    assert_eq!(store.scaling_factor(last), 6);
    assert_eq!(store.component_len(last, 0)?, TIME_STEPS * 5);

    // Element (t, f, b, s) sits at 30 t + 6 f + 3 b + s.
    let filtered = store.component_values(
        last,
        0,
        &[
            ValueFilter::Index { axis: ArgumentAxis::Time, index: 2 },
            ValueFilter::Range { axis: ArgumentAxis::Location, start: 1, end: 3 },
        ],
    )?;
    assert_eq!(filtered.shape(), &[1, 2]);
    assert_eq!(
        filtered.iter().copied().collect::<Vec<_>>(),
        vec![(60 + 6 + 3 + 2) as f64, (60 + 12 + 3 + 2) as f64]
    );
    Ok(())
}

#[test]
fn test_filtered_read_with_extra_axes_before_location() -> Result<()> {
    let mut source = map_file();
    source
        .add_variable(
            "mesh2d_msed",
            DataKind::Double,
            &["time", "nSedSus", "nBedLayers", "mesh2d_nFaces"],
        )?
        .put_attribute("location", "face")
        .put_values((0..TIME_STEPS * 3 * 2 * 5).map(|i| i as f64).collect())?;

    let store = FunctionStore::from_source(source, StoreConfig::default());
    let function = store.function_by_name("mesh2d_msed (1) (2)")?;

    // Element (t, s, b, f) sits at 30 t + 10 s + 5 b + f.
    let step = store.component_values(
        function,
        0,
        &[ValueFilter::Index { axis: ArgumentAxis::Time, index: 1 }],
    )?;
    assert_eq!(step.shape(), &[1, 5]);
    assert_eq!(
        step.iter().copied().collect::<Vec<_>>(),
        vec![55.0, 56.0, 57.0, 58.0, 59.0]
    );

    let window = store.component_values(
        function,
        0,
        &[
            ValueFilter::Index { axis: ArgumentAxis::Time, index: 1 },
            ValueFilter::Range { axis: ArgumentAxis::Location, start: 0, end: 2 },
        ],
    )?;
    assert_eq!(window.shape(), &[1, 2]);
    assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![55.0, 56.0]);

    let all = store.component_values(function, 0, &[])?;
    assert_eq!(all.shape(), &[TIME_STEPS, 5]);
    Ok(())
}

#[test]
fn test_unsupported_extra_axis_skips_only_that_variable() -> Result<()> {
    let mut source = map_file();
    source.add_dimension("mesh2d_nLayers", 7);
    source
        .add_variable("mesh2d_ucz", DataKind::Double, &["time", "mesh2d_nFaces", "mesh2d_nLayers"])?
        .put_attribute("location", "face");
    source
        .add_variable("mesh2d_s1", DataKind::Double, &["time", "mesh2d_nFaces"])?
        .put_attribute("location", "face");
    source
        .add_variable("mesh2d_flowelem_class", DataKind::Byte, &["time", "mesh2d_nFaces"])?
        .put_attribute("location", "face");
    source
        .add_variable("s0", DataKind::Double, &["time", "mesh2d_nFaces"])?
        .put_attribute("location", "face");

    let store = FunctionStore::from_source(source, StoreConfig::default());
    let names: Vec<&str> = store.functions().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["mesh2d_s1"]);
    Ok(())
}

#[test]
fn test_singular_and_plural_axes_bind_the_same_features() -> Result<()> {
    let mut bindings = Vec::new();
    for axis in ["station", "stations"] {
        let mut source = his_file(axis);
        source
            .add_variable("station_name", DataKind::Char, &[axis, "name_len"])?
            .put_text(["Harbour", "Estuary"]);
        source.add_variable("waterlevel", DataKind::Double, &["time", axis])?;

        let store = FunctionStore::from_source(source, StoreConfig::default());
        let binding = store.feature_binding(axis).expect("binding");
        bindings.push((binding.names().join(","), binding.name_variable.clone()));
    }

    assert_eq!(bindings[0], bindings[1]);
    assert_eq!(bindings[0].0, "Harbour,Estuary");
    Ok(())
}

#[test]
fn test_feature_lookup_is_memoized() -> Result<()> {
    let mut source = his_file("cross_section");
    source
        .add_variable("cross_section_name", DataKind::Char, &["cross_section", "name_len"])?
        .put_text(["cs1", "cs2"]);
    source.add_variable("cross_section_discharge", DataKind::Double, &["time", "cross_section"])?;
    source.add_variable("cross_section_area", DataKind::Double, &["time", "cross_section"])?;

    let store = FunctionStore::from_source(source, StoreConfig::default());
    let discharge = store.function_by_name("cross_section_discharge")?;
    let area = store.function_by_name("cross_section_area")?;

    let first = store.feature_values(discharge);
    let second = store.feature_values(area);
    assert_eq!(first.len(), 2);
    assert!(first.iter().zip(&second).all(|(a, b)| Arc::ptr_eq(a, b)));

    let binding = store.feature_binding("cross_section").expect("binding");
    assert!(Arc::ptr_eq(&binding, &store.feature_binding("cross_section").expect("binding")));
    assert_eq!(first[0].kind, FeatureKind::ObservationCrossSection);
    Ok(())
}

#[test]
fn test_unresolved_feature_axis_yields_empty_features() -> Result<()> {
    let mut source = his_file("pumps");
    source
        .add_variable("pump_discharge", DataKind::Double, &["time", "pumps"])?
        .put_values((0..TIME_STEPS * 2).map(|i| i as f64).collect())?;

    let store = FunctionStore::from_source(source, StoreConfig::default());
    let function = store.function_by_name("pump_discharge")?;

    assert_eq!(function.kind, FunctionKind::FeatureCoverage);
    assert!(store.feature_values(function).is_empty());
    assert_eq!(store.time_values(function).len(), TIME_STEPS);
    assert_eq!(store.component_values(function, 0, &[])?.shape(), &[TIME_STEPS, 2]);
    Ok(())
}

#[test]
fn test_pump_names_from_legacy_table() -> Result<()> {
    let mut source = his_file("pumps");
    source
        .add_variable("pump_id", DataKind::Char, &["pumps", "name_len"])?
        .put_text(["P-01", "P-02"]);
    source.add_variable("pump_capacity", DataKind::Double, &["time", "pumps"])?;

    let store = FunctionStore::from_source(source, StoreConfig::default());
    let function = store.function_by_name("pump_capacity")?;
    let names: Vec<String> = store
        .feature_values(function)
        .iter()
        .map(|f| f.name.clone())
        .collect();
    assert_eq!(names, vec!["P-01", "P-02"]);
    assert_eq!(
        store.feature_binding("pumps").and_then(|b| b.name_variable.clone()).as_deref(),
        Some("pump_id")
    );
    Ok(())
}

#[test]
fn test_supplied_features_are_shared() -> Result<()> {
    let mut source = his_file("pumps");
    source
        .add_variable("pump_name", DataKind::Char, &["pumps", "name_len"])?
        .put_text(["North", "South"]);
    source.add_variable("pump_capacity", DataKind::Double, &["time", "pumps"])?;

    let north = Arc::new(Feature::new("NORTH", FeatureKind::Pump));
    let store =
        FunctionStore::with_features(source, StoreConfig::default(), vec![Arc::clone(&north)]);
    let features = store.features_for_dimension("pumps");

    assert!(Arc::ptr_eq(&features[0], &north));
    assert_eq!(features[1].name, "South");
    Ok(())
}

#[test]
fn test_velocity_pair_yields_composite() -> Result<()> {
    let mut source = map_file();
    for (name, standard_name) in [("mesh2d_ucx", "sea_water_x_velocity"), ("mesh2d_ucy", "sea_water_y_velocity")] {
        source
            .add_variable(name, DataKind::Double, &["time", "mesh2d_nFaces"])?
            .put_attribute("location", "face")
            .put_attribute("standard_name", standard_name)
            .put_values(vec![0.5; TIME_STEPS * 5])?;
    }

    let store = FunctionStore::from_source(source, StoreConfig::default());
    assert_eq!(store.functions().len(), 3);

    let composite = store.function_by_name("velocity (ucx + ucy)")?;
    assert_eq!(composite.attribute(COMPOSITE), Some("true"));
    assert_eq!(composite.components.len(), 2);
    assert_eq!(store.component_values(composite, 1, &[])?.shape(), &[TIME_STEPS, 5]);
    assert!(!store.function_groups().values().flatten().any(|f| f.is_composite()));
    Ok(())
}

#[test]
fn test_failed_read_returns_zeros() -> Result<()> {
    let mut source = map_file();
    source
        .add_variable("mesh2d_s1", DataKind::Double, &["time", "mesh2d_nFaces"])?
        .put_attribute("location", "face");

    let store = FunctionStore::from_source(source, StoreConfig::default());
    let function = store.function_by_name("mesh2d_s1")?;
    let values = store.component_values(
        function,
        0,
        &[ValueFilter::Range { axis: ArgumentAxis::Time, start: 1, end: 3 }],
    )?;

    assert_eq!(values.shape(), &[2, 5]);
    assert!(values.iter().all(|&v| v == 0.0));
    assert!(store
        .component_values(function, 0, &[ValueFilter::Index { axis: ArgumentAxis::Time, index: 9 }])
        .is_err());
    Ok(())
}

#[test]
fn test_reconnect_rebuilds_everything() -> Result<()> {
    let mut source = his_file("pumps");
    source
        .add_variable("pump_name", DataKind::Char, &["pumps", "name_len"])?
        .put_text(["old1", "old2"]);
    source.add_variable("pump_capacity", DataKind::Double, &["time", "pumps"])?;

    let mut store = FunctionStore::from_source(source, StoreConfig::default());
    let before = store.features_for_dimension("pumps");
    assert_eq!(before[0].name, "old1");

    let mut rewritten = his_file("pumps");
    rewritten
        .add_variable("pump_name", DataKind::Char, &["pumps", "name_len"])?
        .put_text(["new1", "new2"]);
    rewritten.add_variable("pump_capacity", DataKind::Double, &["time", "pumps"])?;
    rewritten.add_variable("pump_head", DataKind::Double, &["time", "pumps"])?;
    store.source_mut().stage_rewrite(rewritten);

    store.reconnect()?;
    assert_eq!(store.source().reopen_count(), 1);
    assert_eq!(store.functions().len(), 2);
    let after = store.features_for_dimension("pumps");
    assert_eq!(after[0].name, "new1");
    assert!(!Arc::ptr_eq(&before[0], &after[0]));
    Ok(())
}
