use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::load::Table;
use crate::types::Month;

/// One label's cells. A month with no contributing observation has no entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub label: String,
    pub cells: BTreeMap<Month, f64>,
}

impl PivotRow {
    pub fn get(&self, month: Month) -> Option<f64> {
        self.cells.get(&month).copied()
    }
}

/// Label × month matrix. Rows keep first-insertion order, columns are
/// always ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotMatrix {
    months: BTreeSet<Month>,
    rows: Vec<PivotRow>,
    index: HashMap<String, usize>,
    /// (label, month) keys that saw a null value
    nulls: HashSet<(String, Month)>,
}

impl PivotMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a column without touching any cell.
    pub fn add_month(&mut self, month: Month) {
        self.months.insert(month);
    }

    /// Accumulate `value` into `(label, month)`.
    pub fn add(&mut self, label: &str, month: Month, value: f64) {
        self.months.insert(month);
        let idx = match self.index.get(label) {
            Some(&i) => i,
            None => {
                self.rows.push(PivotRow {
                    label: label.to_string(),
                    cells: BTreeMap::new(),
                });
                self.index.insert(label.to_string(), self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        *self.rows[idx].cells.entry(month).or_insert(0.0) += value;
    }

    /// Record a null observation for `(label, month)`. It registers the
    /// column but creates no row and no cell.
    pub fn add_null(&mut self, label: &str, month: Month) {
        self.months.insert(month);
        self.nulls.insert((label.to_string(), month));
    }

    /// True when every observation for `(label, month)` was null.
    pub fn is_null_only(&self, label: &str, month: Month) -> bool {
        self.get(label, month).is_none() && self.nulls.contains(&(label.to_string(), month))
    }

    pub fn get(&self, label: &str, month: Month) -> Option<f64> {
        self.row(label)?.get(month)
    }

    pub fn row(&self, label: &str) -> Option<&PivotRow> {
        self.index.get(label).map(|&i| &self.rows[i])
    }

    pub fn months(&self) -> impl Iterator<Item = Month> + '_ {
        self.months.iter().copied()
    }

    pub fn month_count(&self) -> usize {
        self.months.len()
    }

    pub fn rows(&self) -> &[PivotRow] {
        &self.rows
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.label.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of every present cell.
    pub fn total(&self) -> f64 {
        self.rows.iter().flat_map(|r| r.cells.values()).sum()
    }

    /// Stable reorder of the rows by `compare`; equal rows keep insertion order.
    pub fn sort_rows_by<F>(&mut self, compare: F)
    where
        F: FnMut(&PivotRow, &PivotRow) -> std::cmp::Ordering,
    {
        self.rows.sort_by(compare);
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.label.clone(), i))
            .collect();
    }

    /// Flatten to a table: one `Label` column, then one column per month.
    /// Absent cells become empty strings.
    pub fn to_table(&self) -> Table {
        let mut headers = vec!["Label".to_string()];
        headers.extend(self.months().map(|m| m.to_string()));
        let mut table = Table::new(headers);
        for row in &self.rows {
            let mut out = Vec::with_capacity(self.months.len() + 1);
            out.push(row.label.clone());
            out.extend(
                self.months()
                    .map(|m| row.get(m).map(|v| v.to_string()).unwrap_or_default()),
            );
            table.push_row(out);
        }
        table
    }
}
