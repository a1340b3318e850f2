//! Attribution aggregation and explanation building.
//!
//! Turns per-feature attributions into category evidence, a ranked
//! risk-contribution table, a prose interpretation and a global ranking.

pub mod aggregate;
pub mod global;
pub mod interpretation;
pub mod table;

pub use aggregate::{aggregate_groups, aggregate_timeseries, GroupContributions, TimeseriesContributions};
pub use global::{FeatureImportance, GlobalImportance, InputType};
pub use interpretation::ClinicalInterpretation;
pub use table::{build_detail_table, contribution_strength, truncate_rows, RiskContributionRow, RowKind};
