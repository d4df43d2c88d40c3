use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::io::Cursor;
use tracing::{info, warn};

use super::date_parser::parse_month;
use super::utils::{clean_str, parse_number};
use crate::error::DashboardError;
use crate::types::OperatorSchemeObservation;

pub const DATE: &str = "Date";
pub const OPERATOR: &str = "Operator";
pub const SCHEME: &str = "Scheme Name";
pub const BITUMEN: &str = "Bitumen Production";

/// Parse the header-bearing ST53 in-situ extract. Columns are found by name;
/// extra columns are ignored.
#[tracing::instrument(level = "info", skip(bytes), fields(bytes = bytes.len()))]
pub fn load_operator_observations(bytes: &[u8]) -> Result<Vec<OperatorSchemeObservation>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(Cursor::new(bytes));

    let headers: Vec<String> = rdr
        .headers()
        .context("reading ST53 header row")?
        .iter()
        .map(clean_str)
        .collect();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| DashboardError::MissingColumn {
                name: name.to_string(),
            })
    };
    let (date, operator, scheme, volume) = (
        position(DATE)?,
        position(OPERATOR)?,
        position(SCHEME)?,
        position(BITUMEN)?,
    );

    let mut out = Vec::new();
    let mut nulls = 0usize;
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at ST53 record {}", idx))?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let row = OperatorSchemeObservation {
            date: parse_month(field(date)),
            operator: clean_str(field(operator)),
            scheme: clean_str(field(scheme)),
            bitumen_volume: parse_number(field(volume)),
        };
        if row.date.is_none() || row.bitumen_volume.is_none() {
            nulls += 1;
        }
        out.push(row);
    }

    if nulls > 0 {
        warn!(nulls, "ST53 rows with null date or volume");
    }
    info!(rows = out.len(), "loaded ST53 observations");
    Ok(out)
}
