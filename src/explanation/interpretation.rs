//! Plain-language summary of a prediction and its attributions.

use super::aggregate::GroupContributions;
use super::table::RiskContributionRow;
use crate::core::types::{display_name, RiskLevel};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Contributors within this share of the strongest one are mentioned.
const TOP_RATIO: f64 = 0.75;

/// At most this many contributors are mentioned per direction.
const MAX_ITEMS: usize = 3;

/// Summary of the strongest drivers of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalInterpretation {
    pub risk: f64,
    pub risk_level: RiskLevel,
    pub increasing_groups: Vec<(String, i64)>,
    pub decreasing_groups: Vec<(String, i64)>,
    /// (parameter, raw value)
    pub increasing_features: Vec<(String, Option<f64>)>,
    pub decreasing_features: Vec<(String, Option<f64>)>,
}

impl ClinicalInterpretation {
    /// Interpret a risk score using the category sums and the untruncated
    /// detail table
    pub fn new(risk: f64, groups: &GroupContributions, rows: &[RiskContributionRow]) -> Self {
        let positive: Vec<(String, i64)> = groups
            .categories()
            .iter()
            .filter(|(_, v)| *v > 0)
            .cloned()
            .collect();
        let negative: Vec<(String, i64)> = groups
            .categories()
            .iter()
            .filter(|(_, v)| *v < 0)
            .cloned()
            .collect();

        let features = |sign: f64| -> Vec<(String, Option<f64>)> {
            let matching: Vec<&RiskContributionRow> = rows
                .iter()
                .filter(|r| !r.is_others() && r.contribution * sign > 0.0)
                .collect();
            top_contributors(matching, |r| r.contribution)
                .into_iter()
                .map(|r| (r.parameter.clone(), r.raw_value))
                .collect()
        };

        ClinicalInterpretation {
            risk,
            risk_level: RiskLevel::from_probability(risk),
            increasing_groups: top_contributors(positive, |(_, v)| *v as f64),
            decreasing_groups: top_contributors(negative, |(_, v)| *v as f64),
            increasing_features: features(1.0),
            decreasing_features: features(-1.0),
        }
    }

    /// The summary as prose
    pub fn text(&self) -> String {
        let mut text = format!(
            "The patient's predicted mortality risk is {} ({:.0}%). ",
            self.risk_level.to_string().to_uppercase(),
            self.risk * 100.0
        );

        if self.increasing_groups.is_empty() {
            text.push_str("No category significantly increased the risk. ");
        } else {
            let _ = write!(
                text,
                "The strongest contributing factor category is {}. ",
                format_groups(&self.increasing_groups)
            );
        }
        if self.decreasing_groups.is_empty() {
            text.push_str("No category significantly reduced the risk. ");
        } else {
            let _ = write!(
                text,
                "Risk reduction was mainly due to {}. ",
                format_groups(&self.decreasing_groups)
            );
        }
        if self.increasing_features.is_empty() {
            text.push_str("No single feature drastically increased the risk. ");
        } else {
            let _ = write!(
                text,
                "Notably, {} significantly increased the predicted risk. ",
                format_features(&self.increasing_features)
            );
        }
        if self.decreasing_features.is_empty() {
            text.push_str("No single feature drastically decreased the risk.");
        } else {
            let _ = write!(
                text,
                "In contrast, {} helped reduce the risk.",
                format_features(&self.decreasing_features)
            );
        }
        text
    }
}

/// Strongest item plus up to two more within 75% of it, by magnitude
fn top_contributors<T, F: Fn(&T) -> f64>(mut items: Vec<T>, value: F) -> Vec<T> {
    items.sort_by(|a, b| value(b).abs().total_cmp(&value(a).abs()));
    let Some(first) = items.first().map(|item| value(item).abs()) else {
        return items;
    };
    let mut index = 0;
    items.retain(|item| {
        index += 1;
        index == 1 || value(item).abs() >= TOP_RATIO * first
    });
    items.truncate(MAX_ITEMS);
    items
}

fn format_groups(groups: &[(String, i64)]) -> String {
    groups
        .iter()
        .map(|(name, value)| format!("{} (impact score: {:+})", name, value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_features(features: &[(String, Option<f64>)]) -> String {
    features
        .iter()
        .map(|(name, value)| match value {
            Some(value) => format!("{} ({})", display_name(name), value),
            None => format!("{} (n/a)", display_name(name)),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explanation::table::RowKind;

    fn row(name: &str, contribution: f64, raw: Option<f64>) -> RiskContributionRow {
        RiskContributionRow {
            parameter: name.to_string(),
            kind: RowKind::TimeSeries,
            raw_value: raw,
            formatted_value: String::new(),
            contribution,
            strength: None,
            description: String::new(),
            comparison: String::new(),
        }
    }

    #[test]
    fn test_top_contributors_ratio() {
        let picked = top_contributors(vec![10.0, 8.0, 7.4, 7.6, 9.0], |v| *v);
        assert_eq!(picked, vec![10.0, 9.0, 8.0]);
        let picked = top_contributors(vec![-10.0, -5.0], |v| *v);
        assert_eq!(picked, vec![-10.0]);
        assert!(top_contributors(Vec::<f64>::new(), |v| *v).is_empty());
    }

    #[test]
    fn test_interpretation_text() {
        let rows = vec![
            row("lactate_max", 12.0, Some(4.1)),
            row("sofa", 10.0, Some(9.0)),
            row("age", -6.0, None),
        ];
        let groups = serde_json::from_str::<GroupContributions>(
            r#"{"categories":[["Lab",12],["Clinical",10],["Demographics",-6]],"increasing":22,"decreasing":-6}"#,
        )
        .unwrap();
        let interpretation = ClinicalInterpretation::new(0.8, &groups, &rows);

        assert_eq!(interpretation.risk_level, RiskLevel::High);
        assert_eq!(interpretation.increasing_groups.len(), 2);
        assert_eq!(interpretation.decreasing_features, vec![("age".to_string(), None)]);

        let text = interpretation.text();
        assert!(text.starts_with("The patient's predicted mortality risk is HIGH (80%)."));
        assert!(text.contains("Lab (impact score: +12), Clinical (impact score: +10)"));
        assert!(text.contains("Notably, Lactate Max (4.1), Sofa (9)"));
        assert!(text.contains("In contrast, Age (n/a) helped reduce the risk."));
    }
}
