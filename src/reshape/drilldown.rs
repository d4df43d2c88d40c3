use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

use super::pivot::{PivotMatrix, PivotRow};
use crate::types::Month;

/// Which months the drill-down ranking averages over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePeriod {
    /// Every month in the filtered range
    AllMonths,
    /// The most recent calendar year with all twelve months in range;
    /// falls back to every month when no year is complete
    #[default]
    LatestFullYear,
    /// The last `n` calendar months ending at the newest month in range
    TrailingMonths(u32),
}

impl ReferencePeriod {
    pub fn months(&self, matrix: &PivotMatrix) -> Vec<Month> {
        let all: Vec<Month> = matrix.months().collect();
        let Some(&newest) = all.last() else {
            return all;
        };
        match *self {
            ReferencePeriod::AllMonths => all,
            ReferencePeriod::LatestFullYear => {
                let present: BTreeSet<Month> = all.iter().copied().collect();
                let full_year = (all[0].year()..=newest.year()).rev().find(|&y| {
                    (1..=12).all(|mo| Month::new(y, mo).map_or(false, |m| present.contains(&m)))
                });
                match full_year {
                    Some(y) => all.into_iter().filter(|m| m.year() == y).collect(),
                    None => all,
                }
            }
            ReferencePeriod::TrailingMonths(n) => {
                let first = newest.add_months(-(n.max(1) as i32 - 1));
                all.into_iter().filter(|m| *m >= first).collect()
            }
        }
    }
}

/// Mean of `row` over `months`. An absent cell counts as zero; a month whose
/// only values were null is left out of the denominator.
pub fn reference_mean(matrix: &PivotMatrix, row: &PivotRow, months: &[Month]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &month in months {
        if matrix.is_null_only(&row.label, month) {
            continue;
        }
        sum += row.get(month).unwrap_or(0.0);
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}

/// Order rows by descending reference-period mean. Ties keep the order the
/// rows were first seen in.
pub fn rank_rows(mut matrix: PivotMatrix, period: ReferencePeriod) -> PivotMatrix {
    let months = period.months(&matrix);
    let means: HashMap<String, f64> = matrix
        .rows()
        .iter()
        .map(|row| (row.label.clone(), reference_mean(&matrix, row, &months)))
        .collect();
    matrix.sort_rows_by(|a, b| means[&b.label].total_cmp(&means[&a.label]));
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(year: i32, month: u32) -> Month {
        Month::new(year, month).unwrap()
    }

    fn two_years(rows: &[(&str, f64)]) -> PivotMatrix {
        let mut p = PivotMatrix::new();
        for (label, v) in rows {
            for year in [2023, 2024] {
                for mo in 1..=12 {
                    p.add(label, m(year, mo), *v);
                }
            }
        }
        p
    }

    #[test]
    fn sorts_descending_by_mean() {
        let p = two_years(&[("A – a", 500.0), ("B – b", 1500.0), ("C – c", 1000.0)]);
        let ranked = rank_rows(p, ReferencePeriod::LatestFullYear);
        assert_eq!(
            ranked.labels().collect::<Vec<_>>(),
            vec!["B – b", "C – c", "A – a"]
        );
    }

    #[test]
    fn ties_keep_insertion_order() {
        let p = two_years(&[("z", 10.0), ("a", 10.0), ("m", 20.0)]);
        let ranked = rank_rows(p, ReferencePeriod::AllMonths);
        assert_eq!(ranked.labels().collect::<Vec<_>>(), vec!["m", "z", "a"]);
    }

    #[test]
    fn latest_full_year_ignores_partial_trailing_year() {
        let mut p = two_years(&[("old", 0.0), ("new", 0.0)]);
        // 2024 is the last full year; a big 2025 month must not count
        p.add("old", m(2024, 6), 100.0);
        p.add("new", m(2025, 1), 10_000.0);
        let months = ReferencePeriod::LatestFullYear.months(&p);
        assert_eq!(months.len(), 12);
        assert!(months.iter().all(|m| m.year() == 2024));
        let ranked = rank_rows(p, ReferencePeriod::LatestFullYear);
        assert_eq!(ranked.labels().next(), Some("old"));
    }

    #[test]
    fn no_full_year_falls_back_to_all_months() {
        let mut p = PivotMatrix::new();
        p.add("a", m(2024, 3), 1.0);
        p.add("a", m(2024, 4), 1.0);
        assert_eq!(ReferencePeriod::LatestFullYear.months(&p).len(), 2);
    }

    #[test]
    fn trailing_window_uses_calendar_months() {
        let p = two_years(&[("a", 1.0)]);
        let months = ReferencePeriod::TrailingMonths(12).months(&p);
        assert_eq!(months.first(), Some(&m(2024, 1)));
        assert_eq!(months.last(), Some(&m(2024, 12)));
    }

    #[test]
    fn absent_cells_drag_the_mean_down() {
        let mut p = PivotMatrix::new();
        p.add("a", m(2024, 1), 100.0);
        p.add_month(m(2024, 2));
        let months = ReferencePeriod::AllMonths.months(&p);
        assert_eq!(reference_mean(&p, &p.rows()[0], &months), 50.0);
    }

    #[test]
    fn null_months_leave_the_denominator() {
        let mut p = PivotMatrix::new();
        p.add("A – S", m(2024, 1), 1000.0);
        p.add_null("A – S", m(2024, 2));
        p.add("B – S", m(2024, 1), 700.0);
        p.add("B – S", m(2024, 2), 700.0);
        let months = ReferencePeriod::AllMonths.months(&p);
        assert_eq!(reference_mean(&p, &p.rows()[0], &months), 1000.0);
        let ranked = rank_rows(p, ReferencePeriod::LatestFullYear);
        assert_eq!(ranked.labels().collect::<Vec<_>>(), vec!["A – S", "B – S"]);
    }
}
