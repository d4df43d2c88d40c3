use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::DashboardError;

pub const DATE_COLUMN: &str = "Date";
pub const LABEL_COLUMN: &str = "Label";
pub const VALUE_COLUMN: &str = "Value";
pub const TYPE_COLUMN: &str = "Type";

/// How the first CSV record should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// Every record is data
    Absent,
    /// The first record is always skipped
    Present,
    /// Skip the first record only if it names the layout's columns
    #[default]
    Detect,
}

/// Column-count → column names for the primary dataset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SchemaTable(BTreeMap<usize, Vec<String>>);

/// Resolved positions of the columns the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub names: Vec<String>,
    pub date: usize,
    pub label: usize,
    pub value: usize,
    /// `None` when the layout carries no explicit type column
    pub kind: Option<usize>,
}

impl SchemaTable {
    pub fn new(layouts: BTreeMap<usize, Vec<String>>) -> Result<Self> {
        let table = Self(layouts);
        table.validate()?;
        Ok(table)
    }

    /// Every layout must be as wide as its count and name Date, Label and Value.
    pub fn validate(&self) -> Result<()> {
        for (&count, names) in &self.0 {
            if names.len() != count {
                return Err(anyhow!(
                    "layout for {} columns lists {} names",
                    count,
                    names.len()
                ));
            }
            ColumnLayout::from_names(names)
                .map_err(|e| anyhow!("layout for {} columns: {}", count, e))?;
        }
        Ok(())
    }

    pub fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.keys().copied()
    }

    /// Pick the layout for a record width, or fail with `SchemaMismatch`.
    pub fn layout_for(&self, columns: usize) -> Result<ColumnLayout> {
        let names = self
            .0
            .get(&columns)
            .ok_or(DashboardError::SchemaMismatch { columns })?;
        ColumnLayout::from_names(names)
    }
}

impl Default for SchemaTable {
    /// The three layouts the ST3 extracts have shipped with. Narrower files
    /// drop the unused trailing fields first, then the type column.
    fn default() -> Self {
        let layout = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut map = BTreeMap::new();
        map.insert(
            9,
            layout(&[
                "Year", "Month", "Date", "Label", "Name", "Unused1", "Unused2", "Type", "Value",
            ]),
        );
        map.insert(
            8,
            layout(&[
                "Year", "Month", "Date", "Label", "Name", "Unused1", "Type", "Value",
            ]),
        );
        map.insert(
            7,
            layout(&["Year", "Month", "Date", "Label", "Name", "Unused1", "Value"]),
        );
        Self(map)
    }
}

impl ColumnLayout {
    pub fn from_names(names: &[String]) -> Result<Self> {
        let find = |wanted: &str| names.iter().position(|n| n.eq_ignore_ascii_case(wanted));
        let require = |wanted: &str| {
            find(wanted).ok_or_else(|| {
                anyhow::Error::from(DashboardError::MissingColumn {
                    name: wanted.to_string(),
                })
            })
        };
        Ok(Self {
            names: names.to_vec(),
            date: require(DATE_COLUMN)?,
            label: require(LABEL_COLUMN)?,
            value: require(VALUE_COLUMN)?,
            kind: find(TYPE_COLUMN),
        })
    }

    /// True when `record` spells out this layout's column names.
    pub fn is_header<'a, I>(&self, record: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fields: Vec<&str> = record.into_iter().map(str::trim).collect();
        [self.date, self.label, self.value].iter().all(|&i| {
            fields
                .get(i)
                .map_or(false, |f| f.eq_ignore_ascii_case(&self.names[i]))
        })
    }
}
