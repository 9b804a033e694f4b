use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SubCategory {
    #[serde(rename = "Sub-6")]
    Sub6,
    #[serde(rename = "Sub-8")]
    Sub8,
    #[serde(rename = "Sub-10")]
    Sub10,
    #[serde(rename = "Sub-12")]
    Sub12,
    #[serde(rename = "Sub-14")]
    Sub14,
    #[serde(rename = "Sub-17")]
    Sub17,
}

impl SubCategory {
    pub const ALL: [SubCategory; 6] = [
        SubCategory::Sub6,
        SubCategory::Sub8,
        SubCategory::Sub10,
        SubCategory::Sub12,
        SubCategory::Sub14,
        SubCategory::Sub17,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SubCategory::Sub6 => "Sub-6",
            SubCategory::Sub8 => "Sub-8",
            SubCategory::Sub10 => "Sub-10",
            SubCategory::Sub12 => "Sub-12",
            SubCategory::Sub14 => "Sub-14",
            SubCategory::Sub17 => "Sub-17",
        }
    }

    /// Age the band is named after, used to classify a cohort's average BMI.
    pub fn nominal_age(&self) -> u32 {
        match self {
            SubCategory::Sub6 => 6,
            SubCategory::Sub8 => 8,
            SubCategory::Sub10 => 10,
            SubCategory::Sub12 => 12,
            SubCategory::Sub14 => 14,
            SubCategory::Sub17 => 17,
        }
    }
}

impl fmt::Display for SubCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown subcategory: {0:?}")]
pub struct ParseSubCategoryError(pub String);

impl FromStr for SubCategory {
    type Err = ParseSubCategoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        SubCategory::ALL
            .into_iter()
            .find(|sub| sub.label() == trimmed)
            .ok_or_else(|| ParseSubCategoryError(value.to_string()))
    }
}

/// Minimal per-student input of the alert pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord {
    pub sport_name: String,
    pub sport_display_name: String,
    pub sub_category: SubCategory,
    pub age: u32,
    /// Kilograms.
    pub weight: f64,
    /// Meters. Must be positive, see `validation`.
    pub height: f64,
}

/// Full student row as stored, used by the student export.
#[derive(Debug, Clone)]
pub struct StudentProfile {
    pub id: Uuid,
    pub name: String,
    pub registration_code: String,
    pub phone_number: Option<String>,
    pub shift: String,
    pub record: StudentRecord,
}

#[derive(Debug, Clone)]
pub struct TeacherProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub registration_code: String,
    pub sport_display_name: String,
    pub sub_category: SubCategory,
    pub shift: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SportRecord {
    pub name: String,
    pub route: String,
    pub alter_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdealBmiEntry {
    pub sub_category: SubCategory,
    pub bmi_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BmiClassification {
    #[serde(rename = "Abaixo do peso")]
    Underweight,
    #[serde(rename = "Normal")]
    Healthy,
    #[serde(rename = "Sobrepeso")]
    Overweight,
    #[serde(rename = "Obesidade")]
    Obese,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    #[serde(rename = "Crítico")]
    Critical,
    #[serde(rename = "Atenção")]
    Attention,
    #[serde(rename = "Monitorar")]
    Monitor,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Critical, Severity::Attention, Severity::Monitor];

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "Crítico",
            Severity::Attention => "Atenção",
            Severity::Monitor => "Monitorar",
        }
    }

    pub fn sort_weight(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Attention => 1,
            Severity::Monitor => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity: {0:?}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Severity::ALL
            .into_iter()
            .find(|severity| severity.label() == trimmed)
            .ok_or_else(|| ParseSeverityError(value.to_string()))
    }
}

/// Aggregated statistics of one (sport, subcategory) cohort.
///
/// Values are kept unrounded; rounding happens once when an `AlertItem` is built.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortStat {
    pub sport_name: String,
    pub sport_display_name: String,
    pub sub_category: SubCategory,
    pub students_count: usize,
    pub out_of_range_count: usize,
    pub avg_bmi: f64,
    pub out_of_range_rate: f64,
    pub ideal_bmi: f64,
}

impl CohortStat {
    pub fn normal_rate(&self) -> f64 {
        (100.0 - self.out_of_range_rate).max(0.0)
    }

    pub fn bmi_gap(&self) -> f64 {
        (self.avg_bmi - self.ideal_bmi).abs()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertItem {
    pub sport_name: String,
    pub sport_display_name: String,
    pub sport_route: String,
    pub sub_category: SubCategory,
    pub students_count: usize,
    pub avg_bmi: f64,
    pub ideal_bmi: f64,
    pub bmi_gap: f64,
    pub out_of_range_rate: f64,
    pub normal_rate: f64,
    pub severity: Severity,
    pub recommendation: String,
}

/// Multi-valued alert filters. An empty dimension imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilters {
    pub sports: Vec<String>,
    pub subcategories: Vec<String>,
    pub severities: Vec<String>,
}

impl AlertFilters {
    pub fn is_empty(&self) -> bool {
        self.sports.is_empty() && self.subcategories.is_empty() && self.severities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcategory_labels_parse_back() {
        for sub in SubCategory::ALL {
            assert_eq!(sub.label().parse::<SubCategory>(), Ok(sub));
        }
        assert_eq!(" Sub-10 ".parse::<SubCategory>(), Ok(SubCategory::Sub10));
        assert!("Sub-9".parse::<SubCategory>().is_err());
    }

    #[test]
    fn severity_weights_follow_priority() {
        let weights: Vec<u8> = Severity::ALL.iter().map(Severity::sort_weight).collect();
        assert_eq!(weights, vec![0, 1, 2]);
        assert_eq!("Atenção".parse::<Severity>(), Ok(Severity::Attention));
        assert!("Alto".parse::<Severity>().is_err());
    }

    #[test]
    fn cohort_normal_rate_is_clamped() {
        let stat = CohortStat {
            sport_name: "Futsal".to_string(),
            sport_display_name: "Futsal".to_string(),
            sub_category: SubCategory::Sub8,
            students_count: 1,
            out_of_range_count: 1,
            avg_bmi: 15.0,
            out_of_range_rate: 100.0000001,
            ideal_bmi: 16.18,
        };
        assert_eq!(stat.normal_rate(), 0.0);
        assert!((stat.bmi_gap() - 1.18).abs() < 1e-9);
    }
}
