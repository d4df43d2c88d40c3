use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::io::Read;

/// A plain header + string-rows table, the unit the exporter and publisher
/// work with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    /// Each row, as a Vec of Strings (one per header)
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read a header-bearing CSV.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr
            .headers()
            .context("reading CSV header row")?
            .iter()
            .map(str::to_string)
            .collect();
        let mut table = Self::new(headers);
        for (idx, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
            table.push_row(record.iter().map(str::to_string).collect());
        }
        Ok(table)
    }

    /// Serialise with a header row and no index column.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut wtr = WriterBuilder::new().flexible(true).from_writer(Vec::new());
        wtr.write_record(&self.headers).context("writing CSV header")?;
        for row in &self.rows {
            wtr.write_record(row).context("writing CSV row")?;
        }
        wtr.into_inner()
            .map_err(|e| anyhow!("flushing CSV writer: {}", e.error()))
    }
}
