//! Standalone ST53 view: operator/scheme filters, a monthly production
//! series and a top-operators ranking.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;

use crate::render::format::{escape_html, format_value};
use crate::types::{Month, OperatorSchemeObservation, Unit};

/// Operators preselected when the user hasn't chosen any.
pub const DEFAULT_OPERATOR_COUNT: usize = 5;
pub const TOP_OPERATORS: usize = 10;

/// Sorted distinct non-blank operators.
pub fn available_operators(rows: &[OperatorSchemeObservation]) -> Vec<String> {
    distinct(rows.iter().map(|r| r.operator.as_str()))
}

/// Sorted distinct non-blank scheme names.
pub fn available_schemes(rows: &[OperatorSchemeObservation]) -> Vec<String> {
    distinct(rows.iter().map(|r| r.scheme.as_str()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorFilter {
    pub operators: BTreeSet<String>,
    /// Empty means every scheme
    pub schemes: BTreeSet<String>,
}

impl OperatorFilter {
    /// The first few operators alphabetically, all schemes.
    pub fn default_for(rows: &[OperatorSchemeObservation]) -> Self {
        Self {
            operators: available_operators(rows)
                .into_iter()
                .take(DEFAULT_OPERATOR_COUNT)
                .collect(),
            schemes: BTreeSet::new(),
        }
    }

    pub fn matches(&self, row: &OperatorSchemeObservation) -> bool {
        self.operators.contains(row.operator.trim())
            && (self.schemes.is_empty() || self.schemes.contains(row.scheme.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub month: Month,
    pub production: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorTotal {
    pub operator: String,
    pub production: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorView {
    pub unit: &'static str,
    pub series: Vec<SeriesPoint>,
    pub top_operators: Vec<OperatorTotal>,
}

impl OperatorView {
    /// Rows with a null date stay out of the series but count toward the
    /// operator totals; null volumes count nowhere.
    pub fn build(
        rows: &[OperatorSchemeObservation],
        filter: &OperatorFilter,
        unit: Unit,
        barrel_conversion: f64,
    ) -> Self {
        let factor = unit.factor(barrel_conversion);
        let mut by_month: BTreeMap<Month, f64> = BTreeMap::new();
        let mut by_operator: HashMap<String, f64> = HashMap::new();
        let mut first_seen: Vec<String> = Vec::new();

        for row in rows.iter().filter(|r| filter.matches(r)) {
            let Some(volume) = row.bitumen_volume else { continue };
            let volume = volume * factor;
            if let Some(month) = row.date {
                *by_month.entry(month).or_insert(0.0) += volume;
            }
            let operator = row.operator.trim();
            if !by_operator.contains_key(operator) {
                first_seen.push(operator.to_string());
            }
            *by_operator.entry(operator.to_string()).or_insert(0.0) += volume;
        }

        let mut top_operators: Vec<OperatorTotal> = first_seen
            .into_iter()
            .map(|operator| OperatorTotal {
                production: by_operator[&operator],
                operator,
            })
            .collect();
        top_operators.sort_by(|a, b| b.production.total_cmp(&a.production));
        top_operators.truncate(TOP_OPERATORS);

        Self {
            unit: volume_label(unit),
            series: by_month
                .into_iter()
                .map(|(month, production)| SeriesPoint { month, production })
                .collect(),
            top_operators,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_html(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "<h2>Monthly Bitumen Production ({})</h2>\n<table>",
            self.unit
        );
        out.push_str("<tr><th class=\"label\">Month</th><th>Production</th></tr>\n");
        for p in &self.series {
            let _ = writeln!(
                out,
                "<tr><td class=\"label\">{}</td><td>{}</td></tr>",
                p.month.label(),
                format_value(p.production)
            );
        }
        out.push_str("</table>\n");

        out.push_str("<h2>Top Producing Operators (Selected Range)</h2>\n<table>\n");
        out.push_str("<tr><th class=\"label\">Operator</th><th>Bitumen Production</th></tr>\n");
        for t in &self.top_operators {
            let _ = writeln!(
                out,
                "<tr><td class=\"label\">{}</td><td>{}</td></tr>",
                escape_html(&t.operator),
                format_value(t.production)
            );
        }
        out.push_str("</table>\n");
        out
    }
}

fn volume_label(unit: Unit) -> &'static str {
    match unit {
        Unit::Metric => "m³",
        Unit::Barrels => "bbl",
    }
}
