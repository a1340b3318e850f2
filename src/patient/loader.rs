//! Loading patient records from wide-row CSV tables.
//!
//! One row holds one patient. Columns follow the model's naming scheme:
//! scalar fields by name (`age`, `sofa`, `vent`), flags as
//! `diagnosis_<class>` and `specimen_group_<group>`, laboratory statistics as
//! `<test>_<stat>`, and hourly readings as `<stream>_<hour>`.

use super::laboratory::LabSummary;
use super::record::PatientRecord;
use super::series::HourlySeries;
use crate::core::constants::OBSERVATION_HOURS;
use crate::core::error::{Result, SepsisVisionError};
use crate::core::types::{round_to, LabStat, SeriesSource, StaticGroup};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Collaborator that supplies patients for a study arm.
pub trait PatientSource: Send + Sync {
    /// Load the patient at `index` of the given study arm
    fn load_patient(&self, arm: &str, index: usize) -> Result<PatientRecord>;

    /// Number of patients available in an arm
    fn patient_count(&self, arm: &str) -> Result<usize>;
}

/// Parsed wide-row patient table.
#[derive(Debug, Clone, Default)]
pub struct WidePatientTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

impl WidePatientTable {
    /// Load a table from disk
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            SepsisVisionError::data_loading(format!(
                "Failed to open patient table {}: {}",
                path.display(),
                e
            ))
        })?;
        let table = Self::from_reader(file)?;
        log::info!("Loaded {} patients from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse a table from any reader. Non-numeric cells are read as missing.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let rows = csv_reader
            .records()
            .map(|record| Ok(record?.iter().map(parse_cell).collect()))
            .collect::<Result<Vec<Vec<Option<f64>>>>>()?;

        Ok(WidePatientTable { headers, rows })
    }

    /// Number of patients
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no patients
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Build the record of the patient in row `index`
    pub fn patient(&self, index: usize) -> Result<PatientRecord> {
        let row = self.rows.get(index).ok_or_else(|| {
            SepsisVisionError::invalid_parameter(
                "patient_index",
                index.to_string(),
                format!("table holds {} patients", self.rows.len()),
            )
        })?;
        let cells: HashMap<&str, Option<f64>> = self
            .headers
            .iter()
            .map(String::as_str)
            .zip(row.iter().copied())
            .collect();
        let patient = record_from_row(&cells)?;
        log::debug!("Built patient record from row {}", index);
        Ok(patient)
    }
}

/// Build a patient record from one wide row. Values are rounded to two
/// decimals; age is truncated to whole years.
pub fn record_from_row(cells: &HashMap<&str, Option<f64>>) -> Result<PatientRecord> {
    let cell = |column: &str| cells.get(column).copied().flatten().map(|v| round_to(v, 2));
    let mut patient = PatientRecord::new();

    for group in [
        StaticGroup::Demographics,
        StaticGroup::Scores,
        StaticGroup::Clinical,
        StaticGroup::Diagnosis,
        StaticGroup::Specimen,
    ] {
        let fields: Vec<String> = patient
            .group(group)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default();
        for field in fields {
            let column = match group {
                StaticGroup::Diagnosis => format!("diagnosis_{}", field),
                StaticGroup::Specimen => format!("specimen_group_{}", field),
                _ => field.clone(),
            };
            if !cells.contains_key(column.as_str()) {
                continue;
            }
            let mut value = cell(&column);
            if field == "age" {
                value = value.map(f64::trunc);
            }
            patient.set_static(group, &field, value)?;
        }
    }

    // A test is present when its count column is
    let tests: Vec<&str> = cells
        .keys()
        .filter_map(|column| column.strip_suffix(LabStat::Count.suffix()))
        .filter(|test| !test.is_empty())
        .collect();
    for test in tests {
        let mut summary = LabSummary::default();
        for stat in LabStat::ALL {
            summary.set(stat, cell(&format!("{}{}", test, stat.suffix())));
        }
        patient.set_lab(test, summary);
    }

    for source in [SeriesSource::Vitals, SeriesSource::UrineOutput, SeriesSource::Vasopressor] {
        let streams: Vec<String> = patient
            .streams(source)
            .map(|streams| streams.keys().cloned().collect())
            .unwrap_or_default();
        for stream in streams {
            let hourly: Vec<Option<f64>> = (0..OBSERVATION_HOURS)
                .map(|hour| cell(&format!("{}_{}", stream, hour)))
                .collect();
            patient.set_series(source, &stream, HourlySeries::from_slice(&hourly)?)?;
        }
    }

    Ok(patient)
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Patient source backed by one CSV table per study arm.
#[derive(Debug, Default)]
pub struct CsvPatientSource {
    arms: HashMap<String, WidePatientTable>,
}

impl CsvPatientSource {
    /// Load every arm's table up front
    pub fn load(arms: &[(&str, PathBuf)]) -> Result<Self> {
        let arms = arms
            .iter()
            .map(|(arm, path)| Ok((arm.to_string(), WidePatientTable::load_csv(path)?)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(CsvPatientSource { arms })
    }

    /// Register an already parsed table
    pub fn with_arm(mut self, arm: &str, table: WidePatientTable) -> Self {
        self.arms.insert(arm.to_string(), table);
        self
    }

    fn arm(&self, arm: &str) -> Result<&WidePatientTable> {
        self.arms.get(arm).ok_or_else(|| {
            SepsisVisionError::invalid_parameter("arm", arm, "no patient table registered")
        })
    }
}

impl PatientSource for CsvPatientSource {
    fn load_patient(&self, arm: &str, index: usize) -> Result<PatientRecord> {
        self.arm(arm)?.patient(index)
    }

    fn patient_count(&self, arm: &str) -> Result<usize> {
        Ok(self.arm(arm)?.len())
    }
}
