use std::collections::HashMap;

use serde::Serialize;

use crate::bmi::{self, body_mass_index, round_to};
use crate::models::{BmiClassification, CohortStat, IdealBmiEntry, StudentRecord, SubCategory};

pub type IdealBmiTable = HashMap<SubCategory, f64>;

/// Reference values seeded for each subcategory.
pub const DEFAULT_IDEAL_BMI: [(SubCategory, f64); 6] = [
    (SubCategory::Sub6, 14.68),
    (SubCategory::Sub8, 16.18),
    (SubCategory::Sub10, 17.78),
    (SubCategory::Sub12, 19.16),
    (SubCategory::Sub14, 20.19),
    (SubCategory::Sub17, 20.96),
];

pub const NO_DATA_LABEL: &str = "Sem dados";

pub fn ideal_table(entries: &[IdealBmiEntry]) -> IdealBmiTable {
    entries
        .iter()
        .map(|entry| (entry.sub_category, entry.bmi_value))
        .collect()
}

/// Missing entries read as zero so the cohort stays reportable with a visible gap.
pub fn ideal_for(table: &IdealBmiTable, sub_category: SubCategory) -> f64 {
    table.get(&sub_category).copied().unwrap_or(0.0)
}

#[derive(Debug, Default)]
struct Accumulator {
    count: usize,
    bmi_sum: f64,
    out_of_range: usize,
}

impl Accumulator {
    fn push(&mut self, student: &StudentRecord) {
        let bmi = body_mass_index(student.weight, student.height);
        self.count += 1;
        self.bmi_sum += bmi;
        if bmi::is_out_of_range(bmi, student.age) {
            self.out_of_range += 1;
        }
    }

    fn avg_bmi(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.bmi_sum / self.count as f64
        }
    }

    fn out_of_range_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.out_of_range as f64 / self.count as f64 * 100.0
        }
    }
}

/// Groups students by `(sport_name, sub_category)`.
///
/// Cohorts come out in the order their first student appears, so ranking ties stay
/// deterministic. Empty input yields no cohorts.
pub fn aggregate(students: &[StudentRecord], ideal: &IdealBmiTable) -> Vec<CohortStat> {
    let mut index: HashMap<(&str, SubCategory), usize> = HashMap::new();
    let mut groups: Vec<(&StudentRecord, Accumulator)> = Vec::new();

    for student in students {
        let key = (student.sport_name.as_str(), student.sub_category);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push((student, Accumulator::default()));
            groups.len() - 1
        });
        groups[slot].1.push(student);
    }

    let cohorts: Vec<CohortStat> = groups
        .into_iter()
        .map(|(first, acc)| CohortStat {
            sport_name: first.sport_name.clone(),
            sport_display_name: first.sport_display_name.clone(),
            sub_category: first.sub_category,
            students_count: acc.count,
            out_of_range_count: acc.out_of_range,
            avg_bmi: acc.avg_bmi(),
            out_of_range_rate: acc.out_of_range_rate(),
            ideal_bmi: ideal_for(ideal, first.sub_category),
        })
        .collect();

    tracing::debug!(
        students = students.len(),
        cohorts = cohorts.len(),
        "aggregated cohorts"
    );
    cohorts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BreakdownStatus {
    NoData,
    Classified(BmiClassification),
}

impl BreakdownStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BreakdownStatus::NoData => NO_DATA_LABEL,
            BreakdownStatus::Classified(classification) => classification.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubcategoryBreakdown {
    pub sub_category: SubCategory,
    pub students_count: usize,
    pub out_of_range_count: usize,
    pub avg_bmi: f64,
    pub ideal_bmi: f64,
    pub out_of_range_rate: f64,
    pub normal_rate: f64,
    pub status: BreakdownStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SportBreakdown {
    pub sport_name: String,
    pub students_count: usize,
    pub avg_bmi: f64,
    pub out_of_range_rate: f64,
    pub subcategories: Vec<SubcategoryBreakdown>,
    /// Populated subcategory whose average sits closest to its ideal BMI.
    pub highlight: Option<SubCategory>,
    /// Subcategories with more than 30% of students out of range.
    pub alert_subcategories: Vec<SubCategory>,
}

const BREAKDOWN_ALERT_RATE: f64 = 30.0;

/// Per-sport view over every subcategory, including empty ones reported as "Sem dados".
pub fn sport_breakdown(
    sport_name: &str,
    students: &[StudentRecord],
    ideal: &IdealBmiTable,
) -> SportBreakdown {
    let mut overall = Accumulator::default();
    let mut by_sub: HashMap<SubCategory, Accumulator> = HashMap::new();

    for student in students.iter().filter(|s| s.sport_name == sport_name) {
        overall.push(student);
        by_sub.entry(student.sub_category).or_default().push(student);
    }

    let subcategories: Vec<SubcategoryBreakdown> = SubCategory::ALL
        .into_iter()
        .map(|sub| {
            let ideal_bmi = ideal_for(ideal, sub);
            match by_sub.get(&sub) {
                Some(acc) if acc.count > 0 => {
                    let avg_bmi = round_to(acc.avg_bmi(), 2);
                    let out_of_range_rate = round_to(acc.out_of_range_rate(), 1);
                    SubcategoryBreakdown {
                        sub_category: sub,
                        students_count: acc.count,
                        out_of_range_count: acc.out_of_range,
                        avg_bmi,
                        ideal_bmi,
                        out_of_range_rate,
                        normal_rate: round_to((100.0 - acc.out_of_range_rate()).max(0.0), 1),
                        status: BreakdownStatus::Classified(bmi::classify(
                            avg_bmi,
                            sub.nominal_age(),
                        )),
                    }
                }
                _ => SubcategoryBreakdown {
                    sub_category: sub,
                    students_count: 0,
                    out_of_range_count: 0,
                    avg_bmi: 0.0,
                    ideal_bmi,
                    out_of_range_rate: 0.0,
                    normal_rate: 0.0,
                    status: BreakdownStatus::NoData,
                },
            }
        })
        .collect();

    let mut highlight: Option<(SubCategory, f64)> = None;
    for entry in subcategories.iter().filter(|e| e.students_count > 0) {
        let gap = (entry.avg_bmi - entry.ideal_bmi).abs();
        if highlight.map_or(true, |(_, best)| gap < best) {
            highlight = Some((entry.sub_category, gap));
        }
    }

    let alert_subcategories = subcategories
        .iter()
        .filter(|entry| entry.out_of_range_rate > BREAKDOWN_ALERT_RATE)
        .map(|entry| entry.sub_category)
        .collect();

    SportBreakdown {
        sport_name: sport_name.to_string(),
        students_count: overall.count,
        avg_bmi: round_to(overall.avg_bmi(), 2),
        out_of_range_rate: round_to(overall.out_of_range_rate(), 1),
        subcategories,
        highlight: highlight.map(|(sub, _)| sub),
        alert_subcategories,
    }
}
