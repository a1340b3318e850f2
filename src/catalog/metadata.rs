//! Feature metadata: display units and normal reference ranges.
//!
//! Metadata files use a wide layout. The header row lists feature names
//! after a leading label column, and the rows `unit`, `normal_lower` and
//! `normal_upper` carry one value per feature.

use crate::core::error::{Result, SepsisVisionError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Unit and normal range of one feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetadata {
    /// Display unit, if any
    pub unit: Option<String>,
    /// Lower bound of the clinical reference range
    pub normal_lower: Option<f64>,
    /// Upper bound of the clinical reference range
    pub normal_upper: Option<f64>,
}

impl FeatureMetadata {
    /// Create metadata with a unit and a reference range
    pub fn new(unit: &str, normal_lower: Option<f64>, normal_upper: Option<f64>) -> Self {
        FeatureMetadata {
            unit: (!unit.is_empty()).then(|| unit.to_string()),
            normal_lower,
            normal_upper,
        }
    }

    /// Unit or the empty string
    pub fn unit_or_empty(&self) -> &str {
        self.unit.as_deref().unwrap_or("")
    }
}

/// Ordered feature names together with their metadata, as read from one
/// feature mapping file.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    /// Feature names in file order
    pub names: Vec<String>,
    /// Metadata keyed by feature name
    pub metadata: HashMap<String, FeatureMetadata>,
}

impl FeatureTable {
    /// Load a feature mapping file from disk
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            SepsisVisionError::data_loading(format!(
                "Failed to open feature mapping {}: {}",
                path.display(),
                e
            ))
        })?;
        let table = Self::from_reader(file)?;
        log::info!(
            "Loaded {} feature definitions from {}",
            table.names.len(),
            path.display()
        );
        Ok(table)
    }

    /// Parse a feature mapping from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let names: Vec<String> = csv_reader
            .headers()?
            .iter()
            .skip(1)
            .map(str::to_string)
            .collect();
        let mut metadata: HashMap<String, FeatureMetadata> = names
            .iter()
            .map(|name| (name.clone(), FeatureMetadata::default()))
            .collect();

        for record in csv_reader.records() {
            let record = record?;
            let label = record.get(0).unwrap_or_default();
            for (name, cell) in names.iter().zip(record.iter().skip(1)) {
                let Some(entry) = metadata.get_mut(name) else {
                    continue;
                };
                match label {
                    "unit" => {
                        entry.unit = (!cell.is_empty() && !cell.eq_ignore_ascii_case("nan"))
                            .then(|| cell.to_string());
                    }
                    "normal_lower" => entry.normal_lower = parse_optional(cell),
                    "normal_upper" => entry.normal_upper = parse_optional(cell),
                    _ => {}
                }
            }
        }

        Ok(FeatureTable { names, metadata })
    }

    /// Merge another table's metadata into this one; entries from `other`
    /// replace existing entries with the same name.
    pub fn merged_metadata(&self, other: &FeatureTable) -> HashMap<String, FeatureMetadata> {
        let mut merged = self.metadata.clone();
        merged.extend(other.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

fn parse_optional(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}
