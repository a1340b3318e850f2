//! Feature catalog: feature orderings, category partitions and metadata.
//!
//! The catalog is static configuration. It is validated once when built:
//! static categories must partition the static feature indices and
//! time-series categories must partition the time-series feature names, so
//! that no attribution is counted twice or dropped during aggregation.

pub mod feature_ref;
pub mod metadata;

pub use feature_ref::{FeatureRef, DIAGNOSIS_CLASSES, SPECIMEN_GROUPS, VASOPRESSORS, VITAL_SIGNS};
pub use metadata::{FeatureMetadata, FeatureTable};

use crate::core::error::{Result, SepsisVisionError};
use crate::core::types::StaticIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named group of static feature indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticCategory {
    /// Category name shown to participants
    pub name: String,
    /// Indices into the static feature order; ranges may be disjoint
    pub indices: Vec<StaticIndex>,
}

impl StaticCategory {
    /// Create a category from a list of index ranges
    pub fn from_ranges(name: &str, ranges: &[std::ops::Range<usize>]) -> Self {
        StaticCategory {
            name: name.to_string(),
            indices: ranges.iter().cloned().flatten().collect(),
        }
    }

    /// Static categories of the sepsis mortality model (179 features)
    pub fn sepsis_defaults() -> Vec<StaticCategory> {
        vec![
            StaticCategory::from_ranges("Demographics", &[0..6, 161..163]),
            StaticCategory::from_ranges("Clinical", &[6..16, 163..179]),
            StaticCategory::from_ranges("Lab", &[16..161]),
        ]
    }
}

/// A named group of time-series features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesCategory {
    /// Category name shown to participants
    pub name: String,
    /// Time-series feature names in this category
    pub features: Vec<String>,
}

impl SeriesCategory {
    /// Create a category from feature names
    pub fn new(name: &str, features: &[&str]) -> Self {
        SeriesCategory {
            name: name.to_string(),
            features: features.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Time-series categories of the sepsis mortality model
    pub fn sepsis_defaults() -> Vec<SeriesCategory> {
        vec![
            SeriesCategory::new("Vital Signs", &VITAL_SIGNS),
            SeriesCategory::new("Urine Output", &[feature_ref::URINE_OUTPUT]),
            SeriesCategory::new("Vasopressor", &VASOPRESSORS),
        ]
    }
}

/// Default time-series feature order: vitals, urine output, vasopressors
pub fn sepsis_timeseries_features() -> Vec<String> {
    VITAL_SIGNS
        .iter()
        .chain(std::iter::once(&feature_ref::URINE_OUTPUT))
        .chain(VASOPRESSORS.iter())
        .map(|name| name.to_string())
        .collect()
}

/// Validated, immutable feature catalog.
#[derive(Debug, Clone)]
pub struct FeatureCatalog {
    static_features: Vec<String>,
    static_refs: Vec<FeatureRef>,
    timeseries_features: Vec<String>,
    timeseries_refs: Vec<FeatureRef>,
    static_categories: Vec<StaticCategory>,
    timeseries_categories: Vec<SeriesCategory>,
    metadata: HashMap<String, FeatureMetadata>,
    static_category_of: Vec<usize>,
    series_category_of: HashMap<String, usize>,
}

impl FeatureCatalog {
    /// Build and validate a catalog.
    ///
    /// Fails with a contract error when static categories do not cover
    /// every static index exactly once, or time-series categories do not
    /// partition the time-series features.
    pub fn new(
        static_features: Vec<String>,
        timeseries_features: Vec<String>,
        static_categories: Vec<StaticCategory>,
        timeseries_categories: Vec<SeriesCategory>,
        metadata: HashMap<String, FeatureMetadata>,
    ) -> Result<Self> {
        let static_category_of =
            partition_static(static_features.len(), &static_categories)?;
        let series_category_of =
            partition_series(&timeseries_features, &timeseries_categories)?;

        let static_refs: Vec<FeatureRef> =
            static_features.iter().map(|f| FeatureRef::classify(f)).collect();
        let timeseries_refs: Vec<FeatureRef> =
            timeseries_features.iter().map(|f| FeatureRef::classify(f)).collect();

        for (name, feature_ref) in static_features
            .iter()
            .zip(&static_refs)
            .chain(timeseries_features.iter().zip(&timeseries_refs))
        {
            if !feature_ref.is_known() {
                log::warn!(
                    "Feature '{}' does not resolve to any patient field; it will always be missing",
                    name
                );
            }
        }
        if let Some(name) = timeseries_features
            .iter()
            .zip(&timeseries_refs)
            .find(|(_, r)| !matches!(r, FeatureRef::TimeSeriesAverage { .. }))
            .map(|(name, _)| name)
        {
            return Err(SepsisVisionError::contract(format!(
                "time-series feature '{}' does not name a time-series stream",
                name
            )));
        }

        log::debug!(
            "Feature catalog built: {} static features in {} categories, {} time-series features in {} categories",
            static_features.len(),
            static_categories.len(),
            timeseries_features.len(),
            timeseries_categories.len()
        );

        Ok(FeatureCatalog {
            static_features,
            static_refs,
            timeseries_features,
            timeseries_refs,
            static_categories,
            timeseries_categories,
            metadata,
            static_category_of,
            series_category_of,
        })
    }

    /// Catalog with the sepsis model's default categories and time-series
    /// features. Static feature names come from the feature mapping file.
    pub fn sepsis(
        static_features: Vec<String>,
        metadata: HashMap<String, FeatureMetadata>,
    ) -> Result<Self> {
        Self::new(
            static_features,
            sepsis_timeseries_features(),
            StaticCategory::sepsis_defaults(),
            SeriesCategory::sepsis_defaults(),
            metadata,
        )
    }

    /// Static feature names in declared order
    pub fn static_features(&self) -> &[String] {
        &self.static_features
    }

    /// Time-series feature names in declared order
    pub fn timeseries_features(&self) -> &[String] {
        &self.timeseries_features
    }

    /// Resolved references for the static features
    pub fn static_refs(&self) -> &[FeatureRef] {
        &self.static_refs
    }

    /// Resolved references for the time-series features
    pub fn timeseries_refs(&self) -> &[FeatureRef] {
        &self.timeseries_refs
    }

    /// Number of static features
    pub fn num_static(&self) -> usize {
        self.static_features.len()
    }

    /// Number of time-series features
    pub fn num_timeseries(&self) -> usize {
        self.timeseries_features.len()
    }

    /// Static categories in declared order
    pub fn static_categories(&self) -> &[StaticCategory] {
        &self.static_categories
    }

    /// Time-series categories in declared order
    pub fn timeseries_categories(&self) -> &[SeriesCategory] {
        &self.timeseries_categories
    }

    /// Category name of a static feature index
    pub fn static_category_of(&self, index: StaticIndex) -> Option<&str> {
        self.static_category_of
            .get(index)
            .map(|&c| self.static_categories[c].name.as_str())
    }

    /// Category name of a time-series feature
    pub fn timeseries_category_of(&self, feature: &str) -> Option<&str> {
        self.series_category_of
            .get(feature)
            .map(|&c| self.timeseries_categories[c].name.as_str())
    }

    /// Resolve a feature name, reusing the catalog's classification when
    /// the name is declared
    pub fn feature_ref(&self, name: &str) -> FeatureRef {
        self.static_features
            .iter()
            .position(|f| f == name)
            .map(|i| self.static_refs[i].clone())
            .or_else(|| {
                self.timeseries_features
                    .iter()
                    .position(|f| f == name)
                    .map(|i| self.timeseries_refs[i].clone())
            })
            .unwrap_or_else(|| FeatureRef::classify(name))
    }

    /// Metadata of a feature, if declared
    pub fn metadata(&self, feature: &str) -> Option<&FeatureMetadata> {
        self.metadata.get(feature)
    }

    /// Display unit of a feature, empty when unknown
    pub fn unit(&self, feature: &str) -> &str {
        self.metadata(feature)
            .map(FeatureMetadata::unit_or_empty)
            .unwrap_or("")
    }
}

fn partition_static(num_static: usize, categories: &[StaticCategory]) -> Result<Vec<usize>> {
    let mut owner: Vec<Option<usize>> = vec![None; num_static];
    for (c, category) in categories.iter().enumerate() {
        for &index in &category.indices {
            let slot = owner.get_mut(index).ok_or_else(|| {
                SepsisVisionError::contract(format!(
                    "category '{}' references static index {} but only {} static features are declared",
                    category.name, index, num_static
                ))
            })?;
            if let Some(previous) = slot.replace(c) {
                return Err(SepsisVisionError::contract(format!(
                    "static index {} belongs to both '{}' and '{}'",
                    index, categories[previous].name, category.name
                )));
            }
        }
    }
    owner
        .into_iter()
        .enumerate()
        .map(|(index, c)| {
            c.ok_or_else(|| {
                SepsisVisionError::contract(format!(
                    "static index {} is not assigned to any category",
                    index
                ))
            })
        })
        .collect()
}

fn partition_series(
    features: &[String],
    categories: &[SeriesCategory],
) -> Result<HashMap<String, usize>> {
    let mut owner: HashMap<String, usize> = HashMap::new();
    for (c, category) in categories.iter().enumerate() {
        for feature in &category.features {
            if !features.contains(feature) {
                return Err(SepsisVisionError::contract(format!(
                    "category '{}' lists undeclared time-series feature '{}'",
                    category.name, feature
                )));
            }
            if let Some(previous) = owner.insert(feature.clone(), c) {
                return Err(SepsisVisionError::contract(format!(
                    "time-series feature '{}' belongs to both '{}' and '{}'",
                    feature, categories[previous].name, category.name
                )));
            }
        }
    }
    if let Some(orphan) = features.iter().find(|f| !owner.contains_key(*f)) {
        return Err(SepsisVisionError::contract(format!(
            "time-series feature '{}' is not assigned to any category",
            orphan
        )));
    }
    Ok(owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("lab{}_mean", i)).collect()
    }

    #[test]
    fn test_sepsis_defaults_partition() {
        let catalog = FeatureCatalog::sepsis(names(179), HashMap::new()).unwrap();
        assert_eq!(catalog.num_static(), 179);
        assert_eq!(catalog.num_timeseries(), 14);
        assert_eq!(catalog.static_category_of(0), Some("Demographics"));
        assert_eq!(catalog.static_category_of(161), Some("Demographics"));
        assert_eq!(catalog.static_category_of(170), Some("Clinical"));
        assert_eq!(catalog.static_category_of(20), Some("Lab"));
        assert_eq!(catalog.timeseries_category_of("tempc"), Some("Vital Signs"));
        assert_eq!(catalog.timeseries_category_of("dopamine_dose"), Some("Vasopressor"));
    }

    #[test]
    fn test_overlapping_categories_rejected() {
        let categories = vec![
            StaticCategory::from_ranges("A", &[0..2]),
            StaticCategory::from_ranges("B", &[1..3]),
        ];
        let err = FeatureCatalog::new(names(3), vec![], categories, vec![], HashMap::new())
            .unwrap_err();
        assert!(matches!(err, SepsisVisionError::Contract { .. }));
    }

    #[test]
    fn test_uncovered_index_rejected() {
        let categories = vec![StaticCategory::from_ranges("A", &[0..2])];
        assert!(FeatureCatalog::new(names(3), vec![], categories, vec![], HashMap::new()).is_err());
    }

    #[test]
    fn test_series_partition_rejected() {
        let series = vec!["heartrate".to_string(), "sysbp".to_string()];
        let categories = vec![SeriesCategory::new("Vital Signs", &["heartrate"])];
        let static_categories = vec![StaticCategory::from_ranges("A", &[0..1])];
        let err = FeatureCatalog::new(names(1), series, static_categories, categories, HashMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("sysbp"));
    }

    #[test]
    fn test_feature_ref_lookup() {
        let catalog = FeatureCatalog::sepsis(names(179), HashMap::new()).unwrap();
        assert!(matches!(
            catalog.feature_ref("lab3_mean"),
            FeatureRef::LabStatistic { .. }
        ));
        assert!(matches!(
            catalog.feature_ref("heartrate"),
            FeatureRef::TimeSeriesAverage { .. }
        ));
        assert_eq!(catalog.unit("heartrate"), "");
    }
}
