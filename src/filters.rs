use url::form_urlencoded;
use uuid::Uuid;

use crate::models::{AlertFilters, AlertItem};

pub const SPORT_PARAM: &str = "esporte";
pub const SUB_PARAM: &str = "sub";
pub const SEVERITY_PARAM: &str = "severidade";

/// Splits a comma-separated parameter, trimming entries and dropping empty ones.
pub fn parse_multi_param(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Comma-separated record ids for exports. Entries that are not UUIDs are skipped.
pub fn parse_ids(raw: Option<&str>) -> Vec<Uuid> {
    parse_multi_param(raw)
        .into_iter()
        .filter_map(|item| match item.parse::<Uuid>() {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(id = %item, error = %err, "ignoring export id");
                None
            }
        })
        .collect()
}

fn passes(selected: &[String], value: &str) -> bool {
    selected.is_empty() || selected.iter().any(|item| item == value)
}

pub fn matches(alert: &AlertItem, filters: &AlertFilters) -> bool {
    passes(&filters.sports, &alert.sport_name)
        && passes(&filters.subcategories, alert.sub_category.label())
        && passes(&filters.severities, alert.severity.label())
}

/// Keeps the alerts matching every non-empty dimension, preserving their order.
pub fn filter_alerts(alerts: &[AlertItem], filters: &AlertFilters) -> Vec<AlertItem> {
    alerts
        .iter()
        .filter(|alert| matches(alert, filters))
        .cloned()
        .collect()
}

/// Canonical query string `esporte=..&sub=..&severidade=..`; empty dimensions are omitted.
pub fn build_filter_query(filters: &AlertFilters) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());

    let filters = normalize(filters);
    for (key, values) in [
        (SPORT_PARAM, &filters.sports),
        (SUB_PARAM, &filters.subcategories),
        (SEVERITY_PARAM, &filters.severities),
    ] {
        if !values.is_empty() {
            serializer.append_pair(key, &values.join(","));
        }
    }

    serializer.finish()
}

/// Inverse of `build_filter_query`. Unknown keys are ignored; a repeated key keeps its
/// last value.
pub fn parse_filter_query(query: &str) -> AlertFilters {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut filters = AlertFilters::default();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let values = parse_multi_param(Some(&value));
        match key.as_ref() {
            SPORT_PARAM => filters.sports = values,
            SUB_PARAM => filters.subcategories = values,
            SEVERITY_PARAM => filters.severities = values,
            _ => {}
        }
    }

    filters
}

/// The form a filter set takes after a build/parse round trip.
pub fn normalize(filters: &AlertFilters) -> AlertFilters {
    let clean = |values: &[String]| parse_multi_param(Some(&values.join(",")));
    AlertFilters {
        sports: clean(&filters.sports),
        subcategories: clean(&filters.subcategories),
        severities: clean(&filters.severities),
    }
}

pub fn filter_link(base: &str, filters: &AlertFilters) -> String {
    let query = build_filter_query(filters);
    if query.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{query}")
    }
}
