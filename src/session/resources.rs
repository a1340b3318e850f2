//! Process-wide read-only resources shared by every study session.

use crate::catalog::{FeatureCatalog, FeatureTable};
use crate::config::ExplanationConfig;
use crate::core::constants::OBSERVATION_HOURS;
use crate::core::error::{Result, SepsisVisionError};
use crate::counterfactual::reshape_feature_major;
use crate::explanation::GlobalImportance;
use crate::population::PopulationReference;
use crate::prediction::{Background, FittedScaler, LogisticRiskModel, RiskPredictor};
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

static SHARED: OnceLock<SharedResources> = OnceLock::new();
/// Serializes first-time construction of [`SHARED`]
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Locations of the trained artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePaths {
    /// Logistic model weights (JSON)
    pub model: PathBuf,
    pub static_scaler: PathBuf,
    pub timeseries_scaler: PathBuf,
    /// Scaled background samples, one per row, with both scalers' columns
    pub background: PathBuf,
    /// Population statistics (CSV)
    pub population: PathBuf,
    pub static_metadata: Option<PathBuf>,
    pub timeseries_metadata: Option<PathBuf>,
}

impl ResourcePaths {
    /// Conventional file names inside one artifact directory
    pub fn in_directory<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        ResourcePaths {
            model: dir.join("model.json"),
            static_scaler: dir.join("static_scaler.json"),
            timeseries_scaler: dir.join("timeseries_scaler.json"),
            background: dir.join("background.csv"),
            population: dir.join("population_statistics.csv"),
            static_metadata: Some(dir.join("static_metadata.csv")),
            timeseries_metadata: Some(dir.join("timeseries_metadata.csv")),
        }
    }
}

/// Model, scalers, catalog, population table and configuration.
///
/// Built once and never mutated afterwards, so sessions on any thread may
/// borrow it without locking.
#[derive(Debug)]
pub struct SharedResources {
    predictor: RiskPredictor,
    catalog: FeatureCatalog,
    population: PopulationReference,
    config: ExplanationConfig,
    global_importance: Option<GlobalImportance>,
}

impl SharedResources {
    pub fn new(
        predictor: RiskPredictor,
        catalog: FeatureCatalog,
        population: PopulationReference,
        config: ExplanationConfig,
    ) -> Self {
        SharedResources {
            predictor,
            catalog,
            population,
            config,
            global_importance: None,
        }
    }

    /// Attach a precomputed population-level ranking
    pub fn with_global_importance(mut self, importance: GlobalImportance) -> Self {
        self.global_importance = Some(importance);
        self
    }

    /// Load every artifact and assemble the predictor.
    ///
    /// The static scaler's columns become the catalog's static feature
    /// order, and the time-series catalog uses the default sepsis streams.
    pub fn load(paths: &ResourcePaths, config: ExplanationConfig) -> Result<Self> {
        config.validate()?;
        log::info!("Loading model artifacts from {}", paths.model.display());

        let static_scaler = FittedScaler::load_json(&paths.static_scaler)?;
        let timeseries_scaler = FittedScaler::load_json(&paths.timeseries_scaler)?;
        let model = LogisticRiskModel::load_json(&paths.model)?;
        let population = PopulationReference::load_csv(&paths.population)?;

        let load_metadata = |path: &Option<PathBuf>| -> Result<FeatureTable> {
            match path {
                Some(path) if path.exists() => FeatureTable::load_csv(path),
                Some(path) => {
                    log::warn!("Feature metadata {} not found; units are unavailable", path.display());
                    Ok(FeatureTable::default())
                }
                None => Ok(FeatureTable::default()),
            }
        };
        let static_metadata = load_metadata(&paths.static_metadata)?;
        let timeseries_metadata = load_metadata(&paths.timeseries_metadata)?;
        let catalog = FeatureCatalog::sepsis(
            static_scaler.expected_columns().columns().to_vec(),
            static_metadata.merged_metadata(&timeseries_metadata),
        )?;

        let background = load_background_csv(
            &paths.background,
            &static_scaler,
            &timeseries_scaler,
            config.missing_sentinel,
        )?;
        let predictor = RiskPredictor::new(
            Box::new(model),
            static_scaler,
            timeseries_scaler,
            background,
            &catalog,
            &config,
        )?;

        Ok(SharedResources::new(predictor, catalog, population, config))
    }

    pub fn predictor(&self) -> &RiskPredictor {
        &self.predictor
    }

    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    pub fn population(&self) -> &PopulationReference {
        &self.population
    }

    pub fn config(&self) -> &ExplanationConfig {
        &self.config
    }

    pub fn global_importance(&self) -> Option<&GlobalImportance> {
        self.global_importance.as_ref()
    }
}

/// The process-wide resources, building them on first use.
///
/// Construction runs under a lock, so concurrent callers load the
/// artifacts once and the others wait for that result. A failed `init`
/// leaves the cache empty so a later call can retry.
pub fn shared_or_init<F>(init: F) -> Result<&'static SharedResources>
where
    F: FnOnce() -> Result<SharedResources>,
{
    if let Some(resources) = SHARED.get() {
        return Ok(resources);
    }
    let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(resources) = SHARED.get() {
        return Ok(resources);
    }
    log::info!("Building shared resources");
    let resources = init()?;
    Ok(SHARED.get_or_init(|| resources))
}

/// The process-wide resources, if already built
pub fn shared() -> Option<&'static SharedResources> {
    SHARED.get()
}

/// Read scaled background samples from a CSV with one sample per row.
///
/// Columns are matched by name against both scalers; empty cells take the
/// missing sentinel.
pub fn load_background_csv<P: AsRef<Path>>(
    path: P,
    static_scaler: &FittedScaler,
    timeseries_scaler: &FittedScaler,
    missing_sentinel: f64,
) -> Result<Background> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_string(), i))
        .collect();

    let locate = |columns: &[String]| -> Result<Vec<usize>> {
        columns
            .iter()
            .map(|column| {
                headers.get(column).copied().ok_or_else(|| {
                    SepsisVisionError::contract(format!(
                        "background file {} has no column '{}'",
                        path.display(),
                        column
                    ))
                })
            })
            .collect()
    };
    let static_columns = locate(static_scaler.expected_columns().columns())?;
    let series_columns = locate(timeseries_scaler.expected_columns().columns())?;
    let num_streams = series_columns.len() / OBSERVATION_HOURS;

    let mut static_values = Vec::new();
    let mut series_values = Vec::new();
    let mut samples = 0;
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let cell = |index: usize| -> Result<f64> {
            match record.get(index).unwrap_or("") {
                "" => Ok(missing_sentinel),
                text => text.parse::<f64>().map_err(|e| {
                    SepsisVisionError::data_loading(format!(
                        "background row {}: '{}' is not a number ({})",
                        line + 1,
                        text,
                        e
                    ))
                }),
            }
        };
        for &index in &static_columns {
            static_values.push(cell(index)?);
        }
        let flat = series_columns
            .iter()
            .map(|&index| cell(index))
            .collect::<Result<Array1<f64>>>()?;
        series_values.extend(reshape_feature_major(flat, num_streams)?.iter().copied());
        samples += 1;
    }

    let static_samples = Array2::from_shape_vec((samples, static_columns.len()), static_values)
        .map_err(|e| SepsisVisionError::dimension_mismatch("static background matrix", e.to_string()))?;
    let timeseries_samples =
        Array3::from_shape_vec((samples, OBSERVATION_HOURS, num_streams), series_values).map_err(|e| {
            SepsisVisionError::dimension_mismatch("time-series background tensor", e.to_string())
        })?;
    log::info!("Loaded {} background samples from {}", samples, path.display());
    Background::new(static_samples, timeseries_samples)
}
