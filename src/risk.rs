use std::cmp::Ordering;
use std::collections::HashMap;

use crate::bmi::round_to;
use crate::cohort::{self, IdealBmiTable};
use crate::models::{AlertItem, CohortStat, Severity, SportRecord, StudentRecord};

const CRITICAL_RATE: f64 = 45.0;
const CRITICAL_GAP: f64 = 2.0;
const ATTENTION_RATE: f64 = 30.0;
const ATTENTION_GAP: f64 = 1.0;

/// Critical is checked first; a cohort may meet several brackets at once.
pub fn severity_for(out_of_range_rate: f64, bmi_gap: f64) -> Severity {
    if out_of_range_rate > CRITICAL_RATE || bmi_gap > CRITICAL_GAP {
        Severity::Critical
    } else if out_of_range_rate >= ATTENTION_RATE || bmi_gap >= ATTENTION_GAP {
        Severity::Attention
    } else {
        Severity::Monitor
    }
}

pub fn recommendation_for(severity: Severity, out_of_range_rate: f64) -> &'static str {
    match severity {
        Severity::Critical => {
            "Reforçar acompanhamento semanal e alinhar plano com professor e coordenação."
        }
        Severity::Attention => {
            "Monitorar evolução quinzenal e ajustar carga/rotina de acompanhamento."
        }
        Severity::Monitor if out_of_range_rate > 0.0 => {
            "Manter monitoramento mensal para prevenir regressões."
        }
        Severity::Monitor => "Cenário estável. Manter rotina atual de monitoramento.",
    }
}

pub fn to_alert(cohort: &CohortStat) -> AlertItem {
    let rate = cohort.out_of_range_rate;
    let gap = cohort.bmi_gap();
    let severity = severity_for(rate, gap);

    AlertItem {
        sport_name: cohort.sport_name.clone(),
        sport_display_name: cohort.sport_display_name.clone(),
        sport_route: String::new(),
        sub_category: cohort.sub_category,
        students_count: cohort.students_count,
        avg_bmi: round_to(cohort.avg_bmi, 2),
        ideal_bmi: round_to(cohort.ideal_bmi, 2),
        bmi_gap: round_to(gap, 2),
        out_of_range_rate: round_to(rate, 1),
        normal_rate: round_to(cohort.normal_rate(), 1),
        severity,
        recommendation: recommendation_for(severity, rate).to_string(),
    }
}

/// Severity weight ascending, then out-of-range rate and BMI gap descending.
pub fn compare_alerts(a: &AlertItem, b: &AlertItem) -> Ordering {
    a.severity
        .sort_weight()
        .cmp(&b.severity.sort_weight())
        .then_with(|| b.out_of_range_rate.total_cmp(&a.out_of_range_rate))
        .then_with(|| b.bmi_gap.total_cmp(&a.bmi_gap))
}

/// Annotates every cohort and returns the alerts in priority order.
/// The sort is stable, so full ties keep their input order.
pub fn rank(cohorts: &[CohortStat]) -> Vec<AlertItem> {
    let mut alerts: Vec<AlertItem> = cohorts.iter().map(to_alert).collect();
    alerts.sort_by(compare_alerts);
    alerts
}

pub fn attach_routes(mut alerts: Vec<AlertItem>, sports: &[SportRecord]) -> Vec<AlertItem> {
    let routes: HashMap<&str, &str> = sports
        .iter()
        .map(|sport| (sport.name.as_str(), sport.route.as_str()))
        .collect();

    for alert in alerts.iter_mut() {
        alert.sport_route = routes
            .get(alert.sport_name.as_str())
            .map(|route| route.to_string())
            .unwrap_or_default();
    }
    alerts
}

/// Full pipeline from raw rows to the ranked alert feed.
pub fn build_alerts(
    students: &[StudentRecord],
    sports: &[SportRecord],
    ideal: &IdealBmiTable,
) -> Vec<AlertItem> {
    let cohorts = cohort::aggregate(students, ideal);
    let alerts = attach_routes(rank(&cohorts), sports);
    tracing::debug!(alerts = alerts.len(), "ranked alerts");
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::tests::{default_ideal_table, student};
    use crate::models::SubCategory;

    fn cohort_with(name: &str, rate: f64, gap: f64) -> CohortStat {
        CohortStat {
            sport_name: name.to_string(),
            sport_display_name: name.to_string(),
            sub_category: SubCategory::Sub12,
            students_count: 10,
            out_of_range_count: (rate / 10.0) as usize,
            avg_bmi: 19.0 + gap,
            out_of_range_rate: rate,
            ideal_bmi: 19.0,
        }
    }

    #[test]
    fn severity_follows_thresholds() {
        assert_eq!(severity_for(46.0, 0.1), Severity::Critical);
        assert_eq!(severity_for(10.0, 2.1), Severity::Critical);
        assert_eq!(severity_for(30.0, 0.0), Severity::Attention);
        assert_eq!(severity_for(10.0, 0.5), Severity::Monitor);
    }

    #[test]
    fn severity_boundaries() {
        assert_eq!(severity_for(45.0, 0.0), Severity::Attention);
        assert_eq!(severity_for(0.0, 2.0), Severity::Attention);
        assert_eq!(severity_for(0.0, 1.0), Severity::Attention);
        assert_eq!(severity_for(29.9, 0.99), Severity::Monitor);
    }

    #[test]
    fn recommendation_depends_on_severity_and_risk() {
        let critical = recommendation_for(Severity::Critical, 50.0);
        let attention = recommendation_for(Severity::Attention, 35.0);
        let monitor_risk = recommendation_for(Severity::Monitor, 5.0);
        let monitor_stable = recommendation_for(Severity::Monitor, 0.0);

        assert!(critical.starts_with("Reforçar acompanhamento semanal"));
        assert!(attention.starts_with("Monitorar evolução quinzenal"));
        assert!(monitor_risk.starts_with("Manter monitoramento mensal"));
        assert!(monitor_stable.starts_with("Cenário estável"));
    }

    #[test]
    fn ranks_by_severity_then_rate() {
        let cohorts = vec![
            cohort_with("A", 50.0, 1.0),
            cohort_with("B", 60.0, 0.5),
            cohort_with("C", 35.0, 0.0),
        ];

        let ranked = rank(&cohorts);
        let order: Vec<&str> = ranked.iter().map(|a| a.sport_name.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
        assert_eq!(ranked[0].severity, Severity::Critical);
        assert_eq!(ranked[2].severity, Severity::Attention);
    }

    #[test]
    fn gap_breaks_rate_ties() {
        let cohorts = vec![cohort_with("Low", 20.0, 1.2), cohort_with("High", 20.0, 1.8)];
        let ranked = rank(&cohorts);
        assert_eq!(ranked[0].sport_name, "High");
        assert_eq!(ranked[1].sport_name, "Low");
    }

    #[test]
    fn full_ties_keep_input_order() {
        let cohorts = vec![
            cohort_with("First", 10.0, 0.2),
            cohort_with("Second", 10.0, 0.2),
            cohort_with("Third", 10.0, 0.2),
        ];
        let ranked = rank(&cohorts);
        let order: Vec<&str> = ranked.iter().map(|a| a.sport_name.as_str()).collect();
        assert_eq!(order, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn ranking_empty_list_is_empty() {
        assert!(rank(&[]).is_empty());
    }

    #[test]
    fn alert_values_are_rounded_once() {
        let cohort = CohortStat {
            sport_name: "Futsal".to_string(),
            sport_display_name: "Futsal".to_string(),
            sub_category: SubCategory::Sub12,
            students_count: 3,
            out_of_range_count: 1,
            avg_bmi: 24.004999,
            out_of_range_rate: 100.0 / 3.0,
            ideal_bmi: 19.16,
        };

        let alert = to_alert(&cohort);
        assert_eq!(alert.avg_bmi, 24.0);
        assert_eq!(alert.bmi_gap, 4.84);
        assert_eq!(alert.out_of_range_rate, 33.3);
        assert_eq!(alert.normal_rate, 66.7);
        assert_eq!(alert.severity, Severity::Critical);
    }

    #[test]
    fn builds_alerts_with_routes() {
        let students = vec![
            student("Natacao", SubCategory::Sub12, 12, 19.0),
            student("Basquete", SubCategory::Sub10, 10, 28.0),
            student("Ginastica", SubCategory::Sub8, 8, 16.0),
        ];
        let sports = vec![
            SportRecord {
                name: "Natacao".to_string(),
                route: "natacao".to_string(),
                alter_name: "Natação".to_string(),
            },
            SportRecord {
                name: "Basquete".to_string(),
                route: "basquete".to_string(),
                alter_name: "Basquete".to_string(),
            },
        ];

        let alerts = build_alerts(&students, &sports, &default_ideal_table());
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts[0].sport_name, "Basquete");
        assert_eq!(alerts[0].sport_route, "basquete");
        assert_eq!(alerts[0].severity, Severity::Critical);
        let unknown = alerts
            .iter()
            .find(|a| a.sport_name == "Ginastica")
            .map(|a| a.sport_route.as_str());
        assert_eq!(unknown, Some(""));
    }
}
