//! Rebuilding scaled model inputs from raw patient values.
//!
//! The time-series scaler works on a flat row whose columns run feature by
//! feature (`heartrate_0 .. heartrate_23, sysbp_0 ..`). The model consumes
//! an (hours x features) matrix, so the flat scaled row is reshaped to
//! (features x hours) and transposed.

use crate::catalog::{FeatureCatalog, FeatureRef};
use crate::core::constants::OBSERVATION_HOURS;
use crate::core::error::{Result, SepsisVisionError};
use crate::patient::{MlTensors, PatientRecord};
use crate::prediction::{hourly_column, FeatureRow, RiskPredictor};
use ndarray::{Array1, Array2, ArrayView2};

/// Raw static values keyed by catalog feature name
pub fn static_feature_row(patient: &PatientRecord, catalog: &FeatureCatalog) -> FeatureRow {
    catalog
        .static_features()
        .iter()
        .zip(catalog.static_refs())
        .map(|(name, feature)| (name.as_str(), patient.get_feature_value(feature)))
        .collect()
}

/// Raw hourly values keyed by `<stream>_<hour>`
pub fn timeseries_feature_row(patient: &PatientRecord, catalog: &FeatureCatalog) -> FeatureRow {
    let mut row = FeatureRow::new();
    for (name, feature) in catalog.timeseries_features().iter().zip(catalog.timeseries_refs()) {
        let series = match feature {
            FeatureRef::TimeSeriesAverage { source, name: stream } => patient.series(*source, stream),
            _ => None,
        };
        for hour in 0..OBSERVATION_HOURS {
            row.insert(hourly_column(name, hour), series.and_then(|s| s.get(hour)));
        }
    }
    row
}

/// Flatten an (hours x features) matrix feature by feature
pub fn flatten_feature_major(timeseries: ArrayView2<f64>) -> Array1<f64> {
    timeseries.t().iter().copied().collect()
}

/// Inverse of [`flatten_feature_major`]: reshape to (features x hours) and
/// transpose to (hours x features)
pub fn reshape_feature_major(flat: Array1<f64>, num_features: usize) -> Result<Array2<f64>> {
    let expected = OBSERVATION_HOURS * num_features;
    if flat.len() != expected {
        return Err(SepsisVisionError::dimension_mismatch(
            format!("{} scaled time-series values", expected),
            flat.len().to_string(),
        ));
    }
    let by_feature = flat
        .into_shape_with_order((num_features, OBSERVATION_HOURS))
        .map_err(|e| {
            SepsisVisionError::dimension_mismatch(
                format!("({}, {})", num_features, OBSERVATION_HOURS),
                e.to_string(),
            )
        })?;
    Ok(by_feature.reversed_axes().as_standard_layout().into_owned())
}

/// Scale the patient's current raw values into fresh model inputs.
///
/// Missing inputs are replaced with the predictor's sentinel after scaling.
/// Fails when the scaled time-series length does not cover every catalog
/// stream for the whole observation window.
pub fn rebuild_tensors(
    patient: &PatientRecord,
    catalog: &FeatureCatalog,
    predictor: &RiskPredictor,
) -> Result<MlTensors> {
    let static_row = static_feature_row(patient, catalog);
    let timeseries_row = timeseries_feature_row(patient, catalog);
    let (scaled_static, scaled_timeseries) = predictor.scale_raw_data(&static_row, &timeseries_row)?;

    let sentinel = predictor.missing_sentinel();
    let fill = |v: f64| if v.is_nan() { sentinel } else { v };
    let static_features = scaled_static.mapv(fill);
    let timeseries = reshape_feature_major(scaled_timeseries.mapv(fill), catalog.num_timeseries())?;

    log::debug!(
        "Rebuilt model inputs: {} static, {:?} time-series",
        static_features.len(),
        timeseries.dim()
    );
    Ok(MlTensors {
        static_features,
        timeseries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SeriesCategory, StaticCategory};
    use crate::core::types::SeriesSource;
    use crate::patient::HourlySeries;
    use std::collections::HashMap;

    #[test]
    fn test_flatten_reshape_inverse() {
        let tensor = Array2::from_shape_fn((OBSERVATION_HOURS, 3), |(h, f)| (f * 100 + h) as f64);
        let flat = flatten_feature_major(tensor.view());
        assert_eq!(flat[0], 0.0);
        assert_eq!(flat[1], 1.0);
        assert_eq!(flat[OBSERVATION_HOURS], 100.0);
        assert_eq!(reshape_feature_major(flat, 3).unwrap(), tensor);
    }

    #[test]
    fn test_reshape_rejects_wrong_length() {
        let err = reshape_feature_major(Array1::zeros(OBSERVATION_HOURS * 2 + 1), 2).unwrap_err();
        assert_eq!(err.category(), "dimension_mismatch");
    }

    #[test]
    fn test_rows_follow_catalog_names() {
        let catalog = FeatureCatalog::new(
            vec!["age".into(), "lactate_max".into()],
            vec!["heartrate".into()],
            vec![StaticCategory::from_ranges("All", &[0..2])],
            vec![SeriesCategory::new("Vital Signs", &["heartrate"])],
            HashMap::new(),
        )
        .unwrap();
        let mut patient = PatientRecord::new();
        patient
            .set_static(crate::core::types::StaticGroup::Demographics, "age", Some(70.0))
            .unwrap();
        let mut series = HourlySeries::constant(88.0);
        series.set(5, None).unwrap();
        patient.set_series(SeriesSource::Vitals, "heartrate", series).unwrap();

        let statics = static_feature_row(&patient, &catalog);
        assert_eq!(statics.get("age"), Some(70.0));
        assert_eq!(statics.get("lactate_max"), None);
        assert!(statics.contains("lactate_max"));

        let hourly = timeseries_feature_row(&patient, &catalog);
        assert_eq!(hourly.len(), OBSERVATION_HOURS);
        assert_eq!(hourly.get("heartrate_0"), Some(88.0));
        assert_eq!(hourly.get("heartrate_5"), None);
    }
}
