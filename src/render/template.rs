use anyhow::{Context, Result};
use serde::Deserialize;

/// One line of the statement layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateRow {
    /// Full-width banner
    Section { label: String },
    /// Values looked up by label
    Data { label: String },
    /// Where the breakdown table goes; only the first one renders
    Drilldown,
}

/// Ordered, hand-authored statement layout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct RowTemplate(Vec<TemplateRow>);

impl RowTemplate {
    pub fn new(rows: Vec<TemplateRow>) -> Self {
        Self(rows)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing row template")
    }

    pub fn rows(&self) -> &[TemplateRow] {
        &self.0
    }

    pub fn data_labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|r| match r {
            TemplateRow::Data { label } => Some(label.as_str()),
            _ => None,
        })
    }
}
