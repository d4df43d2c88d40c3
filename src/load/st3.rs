use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io::Cursor;
use tracing::{debug, info, warn};

use super::date_parser::parse_month;
use super::schema::{ColumnLayout, HeaderMode, SchemaTable};
use super::utils::{clean_str, parse_number};
use crate::error::DashboardError;
use crate::types::{FlowType, Observation};

/// Parses the flat ST3 supply/disposition extract into observations.
#[derive(Debug, Clone)]
pub struct St3Loader {
    pub schemas: SchemaTable,
    pub header: HeaderMode,
    /// Applied when the layout has no type column or the cell is blank
    pub default_kind: FlowType,
}

impl Default for St3Loader {
    fn default() -> Self {
        Self {
            schemas: SchemaTable::default(),
            header: HeaderMode::default(),
            default_kind: FlowType::Flow,
        }
    }
}

impl St3Loader {
    /// The layout is chosen from the width of the first record; any record of
    /// a different width aborts the load with `SchemaMismatch`.
    #[tracing::instrument(level = "info", skip(self, bytes), fields(bytes = bytes.len()))]
    pub fn parse(&self, bytes: &[u8]) -> Result<Vec<Observation>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(Cursor::new(bytes));

        let mut layout: Option<ColumnLayout> = None;
        let mut out = Vec::new();
        let mut bad_dates = 0usize;
        let mut bad_values = 0usize;

        for (idx, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;

            if layout.is_none() {
                let l = self.schemas.layout_for(record.len())?;
                debug!(columns = record.len(), "selected layout");
                let skip = match self.header {
                    HeaderMode::Absent => false,
                    HeaderMode::Present => true,
                    HeaderMode::Detect => l.is_header(record.iter()),
                };
                layout = Some(l);
                if skip {
                    continue;
                }
            }
            let Some(layout) = layout.as_ref() else {
                continue;
            };
            if record.len() != layout.names.len() {
                warn!(record = idx, width = record.len(), "ragged record");
                return Err(DashboardError::SchemaMismatch {
                    columns: record.len(),
                }
                .into());
            }

            let obs = self.to_observation(&record, layout);
            if obs.date.is_none() {
                bad_dates += 1;
            }
            if obs.value.is_none() {
                bad_values += 1;
            }
            out.push(obs);
        }

        if bad_dates + bad_values > 0 {
            warn!(bad_dates, bad_values, "coerced unparseable cells to null");
        }
        info!(rows = out.len(), "loaded ST3 observations");
        Ok(out)
    }

    fn to_observation(&self, record: &StringRecord, layout: &ColumnLayout) -> Observation {
        let field = |i: usize| record.get(i).unwrap_or("");
        let kind = match layout.kind {
            Some(i) if !field(i).trim().is_empty() => FlowType::from_raw(Some(field(i))),
            _ => self.default_kind,
        };
        Observation {
            date: parse_month(field(layout.date)),
            label: clean_str(field(layout.label)),
            value: parse_number(field(layout.value)),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Month;
    use std::collections::BTreeMap;

    fn m(year: i32, month: u32) -> Option<Month> {
        Month::new(year, month)
    }

    #[test]
    fn nine_column_headerless() -> Result<()> {
        let csv = "\
2024,2,2024-02-01,Opening Inventory,Alberta,,,Level,2900000
2024,2,2024-02-01,Crude Oil Light,Alberta,,,flow,100
";
        let rows = St3Loader::default().parse(csv.as_bytes())?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "Opening Inventory");
        assert_eq!(rows[0].kind, FlowType::Level);
        assert_eq!(rows[0].date, m(2024, 2));
        assert_eq!(rows[1].value, Some(100.0));
        assert_eq!(rows[1].kind, FlowType::Flow);
        Ok(())
    }

    #[test]
    fn eight_column_with_header() -> Result<()> {
        let csv = "\
Year,Month,Date,Label,Name,Unused1,Type,Value
2024,1,2024-01-01,Fuel,Alberta,,FLOW,31
";
        let rows = St3Loader::default().parse(csv.as_bytes())?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "Fuel");
        assert_eq!(rows[0].kind, FlowType::Flow);
        Ok(())
    }

    #[test]
    fn seven_columns_default_to_flow() -> Result<()> {
        let csv = "2024,1,2024-01-01,Fuel,Alberta,,31\n";
        let loader = St3Loader {
            header: HeaderMode::Absent,
            ..St3Loader::default()
        };
        let rows = loader.parse(csv.as_bytes())?;
        assert_eq!(rows[0].kind, FlowType::Flow);

        let as_level = St3Loader {
            default_kind: FlowType::Level,
            ..loader
        };
        assert_eq!(as_level.parse(csv.as_bytes())?[0].kind, FlowType::Level);
        Ok(())
    }

    #[test]
    fn blank_type_cell_falls_back_to_default() -> Result<()> {
        let csv = "2024,1,2024-01-01,Fuel,Alberta,,,,31\n";
        let rows = St3Loader::default().parse(csv.as_bytes())?;
        assert_eq!(rows[0].kind, FlowType::Flow);
        Ok(())
    }

    #[test]
    fn unknown_width_stops_the_load() {
        let csv = "2024,1,2024-01-01,Fuel,31\n";
        let err = St3Loader::default().parse(csv.as_bytes()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DashboardError>(),
            Some(&DashboardError::SchemaMismatch { columns: 5 })
        );
    }

    #[test]
    fn ragged_record_stops_the_load() {
        let csv = "\
2024,1,2024-01-01,Fuel,Alberta,,31
2024,1,2024-01-01,Fuel,Alberta,,,,,31
";
        let err = St3Loader::default().parse(csv.as_bytes()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DashboardError>(),
            Some(&DashboardError::SchemaMismatch { columns: 10 })
        );
    }

    #[test]
    fn bad_cells_become_null_but_rows_stay() -> Result<()> {
        let csv = "\
2024,1,garbage,Fuel,Alberta,,,flow,31
2024,1,2024-01-01,Fuel,Alberta,,,flow,n/a
";
        let rows = St3Loader::default().parse(csv.as_bytes())?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, None);
        assert_eq!(rows[0].value, Some(31.0));
        assert_eq!(rows[1].date, m(2024, 1));
        assert_eq!(rows[1].value, None);
        Ok(())
    }

    #[test]
    fn custom_schema_table() -> Result<()> {
        let mut map = BTreeMap::new();
        map.insert(
            3,
            vec!["Label".to_string(), "Date".to_string(), "Value".to_string()],
        );
        let loader = St3Loader {
            schemas: SchemaTable::new(map)?,
            header: HeaderMode::Absent,
            default_kind: FlowType::Flow,
        };
        let rows = loader.parse(b"Fuel,2024-03,93\n")?;
        assert_eq!(rows[0].date, m(2024, 3));
        assert_eq!(rows[0].value, Some(93.0));
        Ok(())
    }
}
