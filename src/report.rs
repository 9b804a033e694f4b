use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::bmi::round_to;
use crate::cohort::SportBreakdown;
use crate::filters;
use crate::models::{AlertFilters, AlertItem, Severity};

const ACTION_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertSummary<'a> {
    pub critical_count: usize,
    pub attention_count: usize,
    pub top_risk: Option<&'a AlertItem>,
    /// Mean of the cohorts' normal rates, 0 when there are none.
    pub global_normal_rate: f64,
    pub actions: Vec<&'a AlertItem>,
}

/// Counters over an already ranked alert list.
pub fn summarize(alerts: &[AlertItem]) -> AlertSummary<'_> {
    let count_of = |severity: Severity| alerts.iter().filter(|a| a.severity == severity).count();

    let global_normal_rate = if alerts.is_empty() {
        0.0
    } else {
        let total: f64 = alerts.iter().map(|alert| alert.normal_rate).sum();
        round_to(total / alerts.len() as f64, 1)
    };

    AlertSummary {
        critical_count: count_of(Severity::Critical),
        attention_count: count_of(Severity::Attention),
        top_risk: alerts.first(),
        global_normal_rate,
        actions: alerts
            .iter()
            .filter(|alert| alert.severity != Severity::Monitor)
            .take(ACTION_LIMIT)
            .collect(),
    }
}

fn describe_filters(filters: &AlertFilters) -> String {
    if filters.is_empty() {
        return "todos os esportes e subcategorias".to_string();
    }

    let mut parts = Vec::new();
    if !filters.sports.is_empty() {
        parts.push(format!("esportes {}", filters.sports.join(", ")));
    }
    if !filters.subcategories.is_empty() {
        parts.push(format!("subcategorias {}", filters.subcategories.join(", ")));
    }
    if !filters.severities.is_empty() {
        parts.push(format!("severidades {}", filters.severities.join(", ")));
    }
    parts.join("; ")
}

pub fn build_report(
    filters: &AlertFilters,
    generated_at: DateTime<Utc>,
    alerts: &[AlertItem],
) -> String {
    let summary = summarize(alerts);
    let mut output = String::new();

    let _ = writeln!(output, "# Alertas de Saúde");
    let _ = writeln!(
        output,
        "Gerado para {} em {}",
        describe_filters(filters),
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(
        output,
        "Link: {}",
        filters::filter_link("/alertas", filters)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Resumo");
    let _ = writeln!(output, "- Críticos: {}", summary.critical_count);
    let _ = writeln!(output, "- Atenção: {}", summary.attention_count);
    let _ = writeln!(
        output,
        "- Taxa normal média: {:.1}%",
        summary.global_normal_rate
    );
    match summary.top_risk {
        Some(top) => {
            let _ = writeln!(
                output,
                "- Maior risco: {} {} ({}, {:.1}% fora da faixa)",
                top.sport_display_name, top.sub_category, top.severity, top.out_of_range_rate
            );
        }
        None => {
            let _ = writeln!(output, "- Maior risco: nenhum");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Ações Prioritárias");

    if summary.actions.is_empty() {
        let _ = writeln!(output, "Nenhuma ação prioritária para este filtro.");
    } else {
        for alert in summary.actions.iter() {
            let _ = writeln!(
                output,
                "- [{}] {} {}: {}",
                alert.severity, alert.sport_display_name, alert.sub_category, alert.recommendation
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Coortes");

    if alerts.is_empty() {
        let _ = writeln!(output, "Nenhum alerta encontrado para este filtro.");
    } else {
        let _ = writeln!(
            output,
            "| Severidade | Esporte | Sub | % Fora | IMC Médio | IMC Ideal | Gap | Estudantes |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
        for alert in alerts {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {:.1}% | {:.2} | {:.2} | {:.2} | {} |",
                alert.severity,
                alert.sport_display_name,
                alert.sub_category,
                alert.out_of_range_rate,
                alert.avg_bmi,
                alert.ideal_bmi,
                alert.bmi_gap,
                alert.students_count
            );
        }
    }

    output
}

/// Plain-text rendering of a single sport's subcategory breakdown.
pub fn render_breakdown(display_name: &str, breakdown: &SportBreakdown) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "{display_name}");
    let _ = writeln!(
        output,
        "{} estudantes, IMC médio {:.2}, {:.1}% fora da faixa",
        breakdown.students_count, breakdown.avg_bmi, breakdown.out_of_range_rate
    );
    if let Some(highlight) = breakdown.highlight {
        let _ = writeln!(output, "Destaque: {highlight}");
    }
    if !breakdown.alert_subcategories.is_empty() {
        let labels: Vec<&str> = breakdown
            .alert_subcategories
            .iter()
            .map(|sub| sub.label())
            .collect();
        let _ = writeln!(output, "Atenção: {}", labels.join(", "));
    }
    let _ = writeln!(output);

    for entry in breakdown.subcategories.iter() {
        let _ = writeln!(
            output,
            "- {}: {} estudantes, IMC {:.2} (ideal {:.2}), normal {:.1}%, {}",
            entry.sub_category,
            entry.students_count,
            entry.avg_bmi,
            entry.ideal_bmi,
            entry.normal_rate,
            entry.status.label()
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::sport_breakdown;
    use crate::cohort::tests::{default_ideal_table, student};
    use crate::filters::tests::sample_alerts;
    use crate::models::SubCategory;
    use chrono::TimeZone;

    #[test]
    fn summary_counts_and_actions() {
        let alerts = sample_alerts();
        let summary = summarize(&alerts);

        assert_eq!(summary.critical_count, 1);
        assert_eq!(summary.attention_count, 1);
        assert_eq!(summary.top_risk.map(|a| a.sport_name.as_str()), Some("Basquete"));
        assert_eq!(summary.global_normal_rate, 63.9);
        let actions: Vec<&str> = summary.actions.iter().map(|a| a.sport_name.as_str()).collect();
        assert_eq!(actions, vec!["Basquete", "Futsal"]);
    }

    #[test]
    fn summary_of_empty_list() {
        let summary = summarize(&[]);
        assert_eq!(summary.critical_count, 0);
        assert_eq!(summary.global_normal_rate, 0.0);
        assert!(summary.top_risk.is_none());
        assert!(summary.actions.is_empty());
    }

    #[test]
    fn report_lists_sections() {
        let at = Utc.with_ymd_and_hms(2026, 2, 2, 9, 30, 0).unwrap();
        let filters = AlertFilters {
            severities: vec!["Crítico".to_string()],
            ..AlertFilters::default()
        };
        let report = build_report(&filters, at, &sample_alerts());

        assert!(report.starts_with("# Alertas de Saúde\n"));
        assert!(report.contains("severidades Crítico em 2026-02-02 09:30 UTC"));
        assert!(report.contains("Link: /alertas?severidade=Cr%C3%ADtico"));
        assert!(report.contains("- Críticos: 1"));
        assert!(report.contains("- Maior risco: Basquete Sub-10 (Crítico, 55.0% fora da faixa)"));
        assert!(report.contains("| Atenção | Futsal | Sub-8 | 33.3% | 19.40 | 16.18 | 3.22 | 18 |"));
    }

    #[test]
    fn report_handles_empty_results() {
        let at = Utc.with_ymd_and_hms(2026, 2, 2, 9, 30, 0).unwrap();
        let report = build_report(&AlertFilters::default(), at, &[]);
        assert!(report.contains("todos os esportes e subcategorias"));
        assert!(report.contains("Nenhuma ação prioritária para este filtro."));
        assert!(report.contains("Nenhum alerta encontrado para este filtro."));
    }

    #[test]
    fn breakdown_rendering_marks_empty_subcategories() {
        let students = vec![student("Karate", SubCategory::Sub12, 12, 19.0)];
        let breakdown = sport_breakdown("Karate", &students, &default_ideal_table());
        let text = render_breakdown("Karatê", &breakdown);

        assert!(text.starts_with("Karatê\n"));
        assert!(text.contains("Destaque: Sub-12"));
        assert!(text.contains("- Sub-6: 0 estudantes, IMC 0.00 (ideal 14.68), normal 0.0%, Sem dados"));
        assert!(text.contains("- Sub-12: 1 estudantes, IMC 19.00 (ideal 19.16), normal 100.0%, Normal"));
    }
}
