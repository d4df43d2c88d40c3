// src/config.rs

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

use crate::load::{HeaderMode, SchemaTable, St3Loader};
use crate::render::RowTemplate;
use crate::reshape::{ReferencePeriod, BARREL_CONVERSION};
use crate::types::FlowType;

/// Compiled-in defaults; `--config` swaps in another file of the same shape.
pub const DEFAULT_CONFIG: &str = include_str!("../assets/dashboard.yaml");

#[derive(Debug, Clone, Deserialize)]
pub struct DrilldownConfig {
    pub title: String,
    #[serde(default = "default_label_header")]
    pub label_header: String,
    /// How the secondary values are normalised before pivoting
    #[serde(default = "default_measure")]
    pub measure: FlowType,
    #[serde(default)]
    pub reference: ReferencePeriod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub st3_url: String,
    pub st53_url: String,
    #[serde(default = "default_barrel_conversion")]
    pub barrel_conversion: f64,
    #[serde(default = "default_true")]
    pub convert_levels: bool,
    #[serde(default = "default_window_months")]
    pub default_window_months: u32,
    #[serde(default)]
    pub header: HeaderMode,
    #[serde(default = "default_type")]
    pub default_type: FlowType,
    #[serde(default)]
    pub schemas: SchemaTable,
    pub drilldown: DrilldownConfig,
    pub template: RowTemplate,
}

fn default_label_header() -> String {
    "Operator – Scheme".to_string()
}

fn default_measure() -> FlowType {
    FlowType::Level
}

fn default_barrel_conversion() -> f64 {
    BARREL_CONVERSION
}

fn default_true() -> bool {
    true
}

fn default_window_months() -> u32 {
    24
}

fn default_type() -> FlowType {
    FlowType::Flow
}

impl DashboardConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(text).context("parsing dashboard config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        Self::from_yaml(&text).with_context(|| format!("loading config {:?}", path))
    }

    pub fn builtin() -> Result<Self> {
        Self::from_yaml(DEFAULT_CONFIG)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.barrel_conversion.is_finite() && self.barrel_conversion > 0.0) {
            return Err(anyhow!(
                "barrel_conversion must be positive, got {}",
                self.barrel_conversion
            ));
        }
        if self.default_window_months == 0 {
            return Err(anyhow!("default_window_months must be at least 1"));
        }
        self.schemas.validate().context("invalid schemas table")?;
        Ok(())
    }

    pub fn st3_loader(&self) -> St3Loader {
        St3Loader {
            schemas: self.schemas.clone(),
            header: self.header,
            default_kind: self.default_type,
        }
    }
}
